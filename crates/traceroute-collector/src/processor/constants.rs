// Cross-country samples farther than this and faster than SUSPICIOUS_MAX_RTT_MS
// are flagged as suspicious
pub const SUSPICIOUS_MIN_DISTANCE_KM: f64 = 1000.0;
pub const SUSPICIOUS_MAX_RTT_MS: f64 = 5.0;

// Packet loss percentage above which a hop is congested
pub const CONGESTION_LOSS_PCT: f64 = 50.0;
