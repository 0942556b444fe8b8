mod alerts;
mod readings;
mod records;
