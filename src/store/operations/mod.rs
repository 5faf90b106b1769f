pub mod subjects;
pub mod users;
pub mod word_of_day;
pub mod words;
