//! Вспомогательные модули

pub mod temp;
