//! Static channel backup (`channel.backup`) reading and writing.

pub mod scb;
