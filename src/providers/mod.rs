pub mod market;
pub mod util;
pub mod weather;

pub use market::AlphaVantageProvider;
pub use weather::OpenWeatherProvider;
