use super::Coordinates;

/// Region a traceroute target may be served from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateRegion {
    pub id: &'static str,
    pub coordinates: Coordinates,
    pub city: &'static str,
}

const fn region(id: &'static str, lat: f64, long: f64, city: &'static str) -> CandidateRegion {
    CandidateRegion {
        id,
        coordinates: Coordinates::new(lat, long),
        city,
    }
}

// Order matters: nearest-region ties resolve to the earlier entry
pub const GCP_REGIONS: &[CandidateRegion] = &[
    region("us-west1", 45.5946, -122.6819, "Portland, OR, US"),
    region("us-west2", 34.0489, -118.2529, "Los Angeles, CA, US"),
    region("us-west3", 39.7392, -104.9903, "Denver, CO, US"),
    region("us-west4", 40.7608, -111.8910, "Salt Lake City, UT, US"),
    region("us-south1", 32.7767, -96.7970, "Dallas, TX, US"),
    region("us-east1", 33.8361, -81.1637, "Moncks Corner, SC, US"),
    region("us-east4", 39.0438, -77.4874, "Ashburn, VA, US"),
    region("us-east5", 36.8508, -76.2859, "Norfolk, VA, US"),
    region("us-central1", 41.2586, -95.9378, "Council Bluffs, IA, US"),
    region("southamerica-west1", -12.0464, -77.0428, "Lima, Peru"),
    region("southamerica-east1", -23.5505, -46.6333, "São Paulo, Brazil"),
    region("northamerica-northeast1", 45.5017, -73.5673, "Montreal, QC, CA"),
    region("northamerica-northeast2", 43.6532, -79.3832, "Toronto, ON, CA"),
    region("me-west1", 31.7683, 35.2137, "Tel Aviv, Israel"),
    region("me-central1", 25.276987, 55.296249, "Dubai, UAE"),
    region("me-central2", 24.7136, 46.6753, "Riyadh, Saudi Arabia"),
    region("europe-west1", 53.3331, -6.2489, "Dublin, Ireland"),
    region("europe-west2", 51.5072, -0.1276, "London, UK"),
    region("europe-west3", 50.1109, 8.6821, "Frankfurt, Germany"),
    region("europe-west4", 48.8566, 2.3522, "Paris, France"),
    region("europe-west6", 47.3769, 8.5417, "Zurich, Switzerland"),
    region("europe-west8", 53.5511, 9.9937, "Hamburg, Germany"),
    region("europe-west9", 52.5200, 13.4050, "Berlin, Germany"),
    region("europe-west10", 59.3293, 18.0686, "Stockholm, Sweden"),
    region("europe-west12", 41.9028, 12.4964, "Rome, Italy"),
    region("europe-southwest1", 40.4168, -3.7038, "Madrid, Spain"),
    region("europe-north1", 60.1699, 24.9384, "Helsinki, Finland"),
    region("europe-central2", 52.2297, 21.0122, "Warsaw, Poland"),
    region("australia-southeast1", -33.8688, 151.2093, "Sydney, Australia"),
    region("australia-southeast2", -37.8136, 144.9631, "Melbourne, Australia"),
    region("asia-southeast1", 1.3521, 103.8198, "Singapore, Singapore"),
    region("asia-southeast2", -6.2088, 106.8456, "Jakarta, Indonesia"),
    region("asia-south1", 19.0760, 72.8777, "Mumbai, India"),
    region("asia-south2", 12.9716, 77.5946, "Bangalore, India"),
    region("asia-northeast1", 35.6895, 139.6917, "Tokyo, Japan"),
    region("asia-northeast2", 37.5665, 126.9780, "Seoul, South Korea"),
    region("asia-northeast3", 22.3964, 114.1095, "Hong Kong, Hong Kong"),
    region("asia-east1", 25.0330, 121.5654, "Taipei, Taiwan"),
    region("asia-east2", 23.1291, 113.2644, "Guangzhou, China"),
    region("africa-south1", -26.2041, 28.0473, "Johannesburg, South Africa"),
];

/// Human region names as found in colo metadata, mapped to short business codes
pub const BUSINESS_REGIONS: &[(&str, &str)] = &[
    ("North America", "na"),
    ("South America", "latam"),
    ("Europe", "eu"),
    ("Africa", "afr"),
    ("Middle East", "me"),
    ("Asia Pacific", "apac"),
    ("Asia", "apac"),
    ("Oceania", "apac"),
    ("Test", "test"),
];

pub const UNKNOWN_BUSINESS_REGION: &str = "unknown";

pub fn business_region_code(region_name: &str) -> Option<&'static str> {
    BUSINESS_REGIONS
        .iter()
        .find(|(name, _)| *name == region_name)
        .map(|(_, code)| *code)
}

pub fn is_business_region_code(code: &str) -> bool {
    BUSINESS_REGIONS.iter().any(|(_, c)| *c == code)
}
