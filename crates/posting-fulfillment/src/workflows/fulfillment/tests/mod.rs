mod common;
mod invites;
