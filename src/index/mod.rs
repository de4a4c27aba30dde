pub mod index_set;
pub mod tokenizer;
