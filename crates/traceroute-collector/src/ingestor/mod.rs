pub mod colos;
pub mod fetcher;
pub mod geoip;
pub mod traceroute;
pub mod types;
