//! Shared test harness modules for the homescore CLI.

use super::*;

mod helpers;
mod steps;
