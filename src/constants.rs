// Server configuration
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: &str = "3000";
pub const DEFAULT_DATA_PATH: &str = "data";

// Bearer-token sessions
pub const SESSION_EXPIRY_DAYS: i64 = 30;

// Validation limits
pub const MAX_EVENT_NAME_LENGTH: usize = 255;
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;
pub const MAX_PARTICIPANT_NAME_LENGTH: usize = 255;
pub const MAX_PAYER_NAME_LENGTH: usize = 255;
pub const MAX_NOTE_LENGTH: usize = 500;
pub const MAX_USERNAME_LENGTH: usize = 50;
pub const MIN_USERNAME_LENGTH: usize = 4;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_EMAIL_LENGTH: usize = 255;

// Smallest accepted payment, one cent
pub const MIN_PAYMENT_AMOUNT: f64 = 0.01;

// Error messages
pub const ERR_DATABASE_OPERATION: &str = "Database operation failed";
pub const ERR_INVALID_SESSION: &str = "Invalid session";
pub const ERR_UNAUTHORIZED: &str = "Not logged in";
