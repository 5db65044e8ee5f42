mod enterprises;
mod output;
mod run;
#[cfg(test)]
mod tests;

pub(crate) use run::{run_search, run_show};
