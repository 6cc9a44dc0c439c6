//! This module aggregates all the command modules for the bot.

/// Channel administration (muting the bot).
pub mod admins;
/// General purpose commands (e.g., clearing conversation history).
pub mod general;
/// Commands related to music playback.
pub mod music;
