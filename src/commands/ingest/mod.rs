mod context;
mod db_setup;
mod entities;
mod run;
mod staging;
mod transform;

pub use run::run;

pub(crate) use context::sanity_counts;
#[cfg(test)]
pub(crate) use db_setup::create_final_tables;
