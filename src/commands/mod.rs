pub mod attach;
pub mod create;
pub mod delete;
pub mod export;
pub mod import;
pub mod init;
pub mod list;
pub mod overview;
pub mod profile;
pub mod show;
pub mod stats;
pub mod status;
pub mod timelog;
pub mod update;
