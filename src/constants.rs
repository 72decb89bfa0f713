pub const RECIPE_COUNT_PER_PAGE: i64 = 5;
pub const USER_COUNT_PER_PAGE: i64 = 5;
pub const SUBSCRIPTION_COUNT_PER_PAGE: i64 = 5;

pub const SHORT_CODE_LENGTH: usize = 8;
/* attempts before giving up on a colliding short code */
pub const SHORT_CODE_RETRIES: usize = 5;

pub const SESSION_COOKIE: &str = "session";
pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";
