// Profile builder wizard: basic info -> skills -> education -> experience ->
// projects -> achievements -> summary. Progress lives on the profile row.

pub mod basic_info;
pub mod entries;
pub mod form;
pub mod handlers;
pub mod persistence;
pub mod picture;
pub mod skills;
pub mod steps;
pub mod summary;
pub mod validation;
