pub const WORDS: &str = "words";
pub const SUBJECTS: &str = "subject_words";
pub const WORD_OF_DAY: &str = "word_of_day";
pub const USERS: &str = "users";
pub const META: &str = "meta";
