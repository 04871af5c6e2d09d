#[cfg(test)]
mod harness;
#[cfg(test)]
mod scenario_tests;
