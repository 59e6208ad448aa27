pub mod doctor;
pub mod migrate;
pub mod onboard;
pub mod serve;
