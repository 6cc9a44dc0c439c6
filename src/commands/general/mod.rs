pub mod forget;
