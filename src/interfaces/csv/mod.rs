//! CSV import of violation records used to seed a store.

pub mod violation_reader;
