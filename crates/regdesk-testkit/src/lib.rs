// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod mock;

pub use mock::{MockBackend, RecordedCall};

use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::path::PathBuf;
use time::{Date, Duration, Month, OffsetDateTime};

const ACT_TITLES: [&str; 12] = [
    "Factories Act",
    "Shops and Establishments Act",
    "Payment of Wages Act",
    "Minimum Wages Act",
    "Employees' Provident Funds Act",
    "Contract Labour Act",
    "Maternity Benefit Act",
    "Payment of Gratuity Act",
    "Companies Act",
    "Goods and Services Tax Act",
    "Water (Prevention and Control of Pollution) Act",
    "Payment of Bonus Act",
];

const COUNTRIES: [&str; 5] = ["India", "Singapore", "United Kingdom", "UAE", "Malaysia"];

pub const CATEGORY_NAMES: [&str; 6] = [
    "Labour",
    "Tax",
    "Corporate",
    "Environment",
    "Health and Safety",
    "Industrial Relations",
];

const DOCUMENT_KINDS: [&str; 8] = [
    "Register of Wages",
    "Annual Return",
    "Notice of Opening Hours",
    "Licence Renewal",
    "Abstract Display",
    "Muster Roll",
    "Accident Report",
    "Half-Yearly Return",
];

const FORM_CODES: [&str; 8] = [
    "Form A", "Form B", "Form C", "Form XIII", "Form 21", "Form 25", "Form D", "Form V",
];

const EVENT_NAMES: [&str; 6] = [
    "Annual General Meeting",
    "Board Meeting",
    "Change of Director",
    "Allotment of Shares",
    "Change in Registered Office",
    "Appointment of Auditor",
];

const COMPLIANCE_FORMS: [&str; 8] = [
    "Form MGT-7",
    "Form AOC-4",
    "Form DIR-12",
    "Form PAS-3",
    "Form INC-22",
    "Form ADT-1",
    "Form MGT-14",
    "Form DPT-3",
];

const COMPANIES: [&str; 8] = [
    "Apex Textiles Pvt Ltd",
    "Heritage Foods Ltd",
    "Summit Logistics LLP",
    "Greenleaf Pharma Ltd",
    "Bright Steel Works",
    "Central Retail Pvt Ltd",
    "Eagle Motors Ltd",
    "Reliable Infra Projects",
];

const FREQUENCIES: [&str; 5] = ["Monthly", "Quarterly", "Half-Yearly", "Annual", "One Time"];

pub const STATES: [(&str, &str); 12] = [
    ("Maharashtra", "MH"),
    ("Karnataka", "KA"),
    ("Tamil Nadu", "TN"),
    ("Gujarat", "GJ"),
    ("Delhi", "DL"),
    ("Telangana", "TS"),
    ("West Bengal", "WB"),
    ("Uttar Pradesh", "UP"),
    ("Rajasthan", "RJ"),
    ("Kerala", "KL"),
    ("Haryana", "HR"),
    ("Punjab", "PB"),
];

const REFERENCE_YEAR: i32 = 2026;

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Deterministic generator of backend-shaped records. Field names follow
/// the backend's wire format so mapping code sees realistic input.
#[derive(Debug, Clone)]
pub struct ComplianceFaker {
    rng: DeterministicRng,
}

impl ComplianceFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn int_range(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = (max - min + 1) as u64;
        min + (self.rng.next_u64() % span) as i64
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn status(&mut self) -> i64 {
        // mostly active, like a live master list
        if self.rng.int_n(5) == 0 { 0 } else { 1 }
    }

    fn timestamp(&mut self) -> String {
        let days = self.int_range(0, 364);
        let moment = reference_now() - Duration::days(days);
        backend_timestamp(moment)
    }

    /// Dropdown entries for act selectors: `{id, actId, name}`.
    pub fn act_options(&mut self, count: usize) -> Vec<Value> {
        ACT_TITLES
            .iter()
            .take(count)
            .enumerate()
            .map(|(index, title)| {
                let id = index as i64 + 1;
                json!({"id": id, "actId": 100 + id, "name": title})
            })
            .collect()
    }

    pub fn act_details(&mut self, act_id: i64, act_name: &str) -> Vec<Value> {
        let slug = slug(act_name);
        vec![json!({
            "id": act_id,
            "actName": act_name,
            "description": format!("Statutory obligations under the {act_name}"),
            "country": self.pick(&COUNTRIES),
            "category": self.pick(&CATEGORY_NAMES),
            "url": format!("https://acts.example.test/{slug}"),
            "status": self.status(),
            "createdAt": self.timestamp(),
            "updatedAt": self.timestamp(),
        })]
    }

    /// Document rows keyed by the `sr` serial the backend uses.
    pub fn documents(&mut self, act_name: &str, first_sr: i64, count: usize) -> Vec<Value> {
        (0..count)
            .map(|offset| {
                let kind = self.pick(&DOCUMENT_KINDS);
                json!({
                    "sr": first_sr + offset as i64,
                    "docname": format!("{kind} ({act_name})"),
                    "actName": act_name,
                    "url": format!("https://docs.example.test/{}/{}", slug(act_name), first_sr + offset as i64),
                    "status": self.status(),
                    "createdAt": self.timestamp(),
                })
            })
            .collect()
    }

    pub fn forms(&mut self, act_name: &str, first_id: i64, count: usize) -> Vec<Value> {
        (0..count)
            .map(|offset| {
                let code = self.pick(&FORM_CODES);
                json!({
                    "id": first_id + offset as i64,
                    "formName": format!("{code} under {act_name}"),
                    "formNo": code,
                    "actName": act_name,
                    "description": "Prescribed statutory form",
                    "url": format!("https://forms.example.test/{}", first_id + offset as i64),
                    "status": self.status(),
                    "createdAt": self.timestamp(),
                })
            })
            .collect()
    }

    pub fn event_options(&mut self) -> Vec<Value> {
        EVENT_NAMES
            .iter()
            .enumerate()
            .map(|(index, name)| json!({"id": index as i64 + 1, "name": name}))
            .collect()
    }

    pub fn company_events(&mut self, first_id: i64, count: usize) -> Vec<Value> {
        (0..count)
            .map(|offset| {
                let due = reference_now() + Duration::days(self.int_range(1, 180));
                json!({
                    "id": first_id + offset as i64,
                    "compliance": self.pick(&COMPLIANCE_FORMS),
                    "company": self.pick(&COMPANIES),
                    "dueDate": backend_timestamp(due),
                    "frequency": self.pick(&FREQUENCIES),
                    "status": self.status(),
                })
            })
            .collect()
    }

    pub fn states(&mut self) -> Vec<Value> {
        STATES
            .iter()
            .enumerate()
            .map(|(index, (name, short_name))| {
                json!({
                    "id": index as i64 + 1,
                    "name": name,
                    "short_name": short_name,
                    "status": self.status(),
                    "createdAt": self.timestamp(),
                    "updatedAt": self.timestamp(),
                })
            })
            .collect()
    }

    pub fn categories(&mut self) -> Vec<Value> {
        CATEGORY_NAMES
            .iter()
            .enumerate()
            .map(|(index, name)| {
                json!({
                    "id": index as i64 + 1,
                    "name": name,
                    "description": format!("{name} compliances"),
                    "status": self.status(),
                    "createdAt": self.timestamp(),
                })
            })
            .collect()
    }

    pub fn news(&mut self, count: usize) -> Vec<Value> {
        (0..count)
            .map(|offset| {
                let act = self.pick(&ACT_TITLES);
                json!({
                    "id": offset as i64 + 1,
                    "title": format!("Amendment notified to the {act}"),
                    "url": format!("https://news.example.test/{}/{}", slug(act), offset + 1),
                    "createdAt": self.timestamp(),
                })
            })
            .collect()
    }
}

/// One document record exactly as the document list endpoint sends it.
pub fn document_record(sr: i64, docname: &str, status: i64) -> Value {
    json!({"sr": sr, "docname": docname, "status": status})
}

/// Scratch directory plus a `config.toml` path inside it; keep the dir alive.
pub fn temp_config_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("config.toml");
    Ok((dir, path))
}

/// The `YYYY-MM-DD HH:MM:SS` form several endpoints use.
pub fn backend_timestamp(moment: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        moment.year(),
        u8::from(moment.month()),
        moment.day(),
        moment.hour(),
        moment.minute(),
        moment.second(),
    )
}

fn reference_now() -> OffsetDateTime {
    match Date::from_calendar_date(REFERENCE_YEAR, Month::January, 1) {
        Ok(date) => date.midnight().assume_utc(),
        Err(_) => OffsetDateTime::UNIX_EPOCH,
    }
}

fn slug(text: &str) -> String {
    text.chars()
        .filter_map(|ch| {
            if ch.is_ascii_alphanumeric() {
                Some(ch.to_ascii_lowercase())
            } else if ch == ' ' {
                Some('-')
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{ComplianceFaker, STATES, backend_timestamp, document_record, slug};
    use time::macros::datetime;

    #[test]
    fn same_seed_same_records() {
        let mut left = ComplianceFaker::new(42);
        let mut right = ComplianceFaker::new(42);
        assert_eq!(
            left.documents("Factories Act", 1, 5),
            right.documents("Factories Act", 1, 5)
        );
    }

    #[test]
    fn documents_use_backend_field_names() {
        let mut faker = ComplianceFaker::new(7);
        let docs = faker.documents("Factories Act", 10, 3);
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0]["sr"], 10);
        assert_eq!(docs[2]["sr"], 12);
        assert!(docs[0]["docname"].as_str().is_some_and(|name| name.contains("Factories Act")));
    }

    #[test]
    fn states_have_short_names() {
        let mut faker = ComplianceFaker::new(1);
        let states = faker.states();
        assert_eq!(states.len(), STATES.len());
        assert_eq!(states[0]["short_name"], "MH");
    }

    #[test]
    fn int_range_stays_in_bounds() {
        let mut faker = ComplianceFaker::new(3);
        for _ in 0..200 {
            let value = faker.int_range(3, 14);
            assert!((3..=14).contains(&value));
        }
        assert_eq!(faker.int_range(5, 5), 5);
    }

    #[test]
    fn helpers() {
        assert_eq!(slug("Employees' Provident Funds Act"), "employees-provident-funds-act");
        assert_eq!(
            backend_timestamp(datetime!(2026-02-19 12:34:56 UTC)),
            "2026-02-19 12:34:56"
        );
        assert_eq!(document_record(1, "Form A", 1)["docname"], "Form A");
    }
}
