use rand::seq::SliceRandom;
use rand::Rng;

/// Desktop user agents used when a source does not supply its own list.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

const VIEWPORTS: &[(u32, u32)] = &[(1920, 1080), (1366, 768), (1536, 864), (1440, 900)];

/// Pick one user agent at random from `pool`, falling back to the defaults
/// when `pool` is empty.
pub fn pick_user_agent(pool: &[String]) -> String {
    let mut rng = rand::thread_rng();
    pool.choose(&mut rng).cloned().unwrap_or_else(|| {
        DEFAULT_USER_AGENTS
            .choose(&mut rng)
            .map(|ua| (*ua).to_string())
            .unwrap_or_default()
    })
}

/// Per-page fingerprint
#[derive(Debug, Clone)]
pub struct FingerprintConfig {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl FingerprintConfig {
    /// Random viewport with a user agent drawn from `pool`
    pub fn randomized(pool: &[String]) -> Self {
        let mut rng = rand::thread_rng();
        let (width, height) = VIEWPORTS[rng.gen_range(0..VIEWPORTS.len())];

        Self {
            user_agent: pick_user_agent(pool),
            viewport_width: width,
            viewport_height: height,
        }
    }
}
