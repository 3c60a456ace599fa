pub mod forecast_aggregator;
pub mod providers;
pub mod recommendation;
pub mod upstream;
pub mod weather;

pub use providers::{ForecastProvider, OpenWeatherProvider};
pub use recommendation::{RecommendationPipeline, RecommendationService, TOP_K};
pub use upstream::{ComfortClient, RecommendationClient, RecommendationGateway, UpstreamTransport};
pub use weather::{Clock, FixedClock, SystemClock, WeatherService, WINDOW_DAYS};
