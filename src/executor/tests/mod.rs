mod budget_tests;
mod command_tests;
mod control_tests;
mod helpers;
