//! Interfaces between `symblock` and the outside world.

pub mod cli;
