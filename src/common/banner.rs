const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

pub struct BannerInfo {
    pub version: &'static str,
    pub build_time_ms: &'static str,
    pub branch: &'static str,
    pub commit: &'static str,
    pub profile: &'static str,
}

impl Default for BannerInfo {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            build_time_ms: option_env!("BUILD_TIME").unwrap_or("0"),
            branch: option_env!("GIT_BRANCH").unwrap_or("unknown"),
            commit: option_env!("GIT_COMMIT").unwrap_or("unknown"),
            profile: if cfg!(debug_assertions) {
                "debug"
            } else {
                "release"
            },
        }
    }
}

pub fn print_banner(info: &BannerInfo) {
    println!();
    println!("{GREEN}    __    ______   ______    ___   ______   ____ {RESET}");
    println!("{GREEN}   / /   / ____/  / ____/   /   | /_  __/  / __ \\{RESET}");
    println!("{GREEN}  / /   / __/    / / __    / /| |  / /    / / / /{RESET}");
    println!("{GREEN} / /___/ /___   / /_/ /   / ___ | / /    / /_/ / {RESET}");
    println!("{GREEN}/_____//_____/  \\____/   /_/  |_|/_/     \\____/  {RESET}");
    println!("{DIM}================================================={RESET}");
    println!();

    let commit_short: String = info.commit.chars().take(7).collect();

    print_row("Version", info.version, CYAN);
    print_row("Build time", &format_build_time(info.build_time_ms), RESET);
    print_row("Branch", info.branch, RESET);
    print_row("Commit", &commit_short, RESET);
    print_row("Profile", info.profile, YELLOW);
    println!();
}

fn format_build_time(ms: &str) -> String {
    let Ok(ms) = ms.parse::<i128>() else {
        return "unknown".to_string();
    };
    if ms == 0 {
        return "unknown".to_string();
    }
    let Ok(ts) = time::OffsetDateTime::from_unix_timestamp_nanos(ms * 1_000_000) else {
        return "unknown".to_string();
    };
    let format =
        time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");
    ts.format(&format).unwrap_or_else(|_| "unknown".to_string())
}

fn print_row(label: &str, value: &str, color: &str) {
    println!("  {BOLD}{label:<14}{RESET}{color}{value}{RESET}");
}
