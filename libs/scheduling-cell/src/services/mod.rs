pub mod agenda;
pub mod availability;
pub mod booking;
pub mod calendar;
pub mod conflict;
pub mod consistency;
pub mod recurrence;
pub mod series;
