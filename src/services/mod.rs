//! Domain services.
//!
//! SYSTEM CONTEXT
//! ==============
//! Three collaborator seams for the coordinator (`identity`, `principal`,
//! `access`) and the persistence services behind the REST handlers
//! (`ticket`, `channel`, `reaction`, `mention`). Apart from mention
//! notifications, services never push frames; route handlers call the
//! coordinator after a successful write.

pub mod access;
pub mod channel;
pub mod identity;
pub mod mention;
pub mod principal;
pub mod reaction;
pub mod ticket;
