pub mod comfyui;
pub mod dictionary;
pub mod images;
pub mod llm;
pub mod poller;
pub mod relay;
pub mod storage;
pub mod subjects;
pub mod upload;
pub mod word_of_day;
