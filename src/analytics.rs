use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::{CategoryType, Direction, Transaction};

/// Month and bank selection. `None` means "All".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyticsFilter {
    pub month: Option<String>,
    pub bank: Option<String>,
}

impl AnalyticsFilter {
    pub fn new(month: Option<String>, bank: Option<String>) -> Self {
        let normalize = |v: Option<String>| v.filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"));
        Self {
            month: normalize(month),
            bank: normalize(bank),
        }
    }

    pub fn matches(&self, txn: &Transaction) -> bool {
        let month_ok = self
            .month
            .as_deref()
            .map_or(true, |m| txn.date.starts_with(m));
        let bank_ok = self.bank.as_deref().map_or(true, |b| txn.bank_name == b);
        month_ok && bank_ok
    }

    pub fn describe(&self) -> String {
        match (&self.month, &self.bank) {
            (None, None) => "complete history".to_string(),
            (Some(m), None) => m.clone(),
            (None, Some(b)) => b.clone(),
            (Some(m), Some(b)) => format!("{m}, {b}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub total_spent: f64,
    pub total_received: f64,
    pub personal_spending: f64,
    pub office_spending: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowBucket {
    pub key: String,
    pub spent: f64,
    pub received: f64,
}

pub fn filter_records<'a>(records: &'a [Transaction], filter: &AnalyticsFilter) -> Vec<&'a Transaction> {
    records.iter().filter(|t| filter.matches(t)).collect()
}

pub fn summarize(records: &[&Transaction]) -> Summary {
    records.iter().fold(Summary::default(), |mut acc, t| {
        acc.count += 1;
        match t.direction {
            Direction::Received => acc.total_received += t.amount,
            Direction::Spent => {
                acc.total_spent += t.amount;
                match t.category {
                    CategoryType::Personal => acc.personal_spending += t.amount,
                    CategoryType::Office => acc.office_spending += t.amount,
                }
            }
        }
        acc
    })
}

/// Personal vs office split of spending.
pub fn expense_mix(summary: &Summary) -> [NamedValue; 2] {
    [
        NamedValue {
            name: "Personal Expense".to_string(),
            value: summary.personal_spending,
        },
        NamedValue {
            name: "Office Expense".to_string(),
            value: summary.office_spending,
        },
    ]
}

/// Spending per tag, largest first.
pub fn tag_breakdown(records: &[&Transaction]) -> Vec<NamedValue> {
    let mut grouped: HashMap<&str, f64> = HashMap::new();
    for t in records.iter().filter(|t| t.direction == Direction::Spent) {
        *grouped.entry(t.tag_or_default()).or_insert(0.0) += t.amount;
    }
    let mut items: Vec<NamedValue> = grouped
        .into_iter()
        .map(|(name, value)| NamedValue {
            name: name.to_string(),
            value,
        })
        .collect();
    items.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    items
}

/// Spent and received per time bucket, oldest first. Buckets are months when
/// no month is selected, otherwise individual dates.
pub fn trend(records: &[&Transaction], filter: &AnalyticsFilter) -> Vec<FlowBucket> {
    let mut grouped: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for t in records {
        let key = if filter.month.is_some() {
            t.date.as_str()
        } else {
            t.month()
        };
        let entry = grouped.entry(key).or_insert((0.0, 0.0));
        match t.direction {
            Direction::Spent => entry.0 += t.amount,
            Direction::Received => entry.1 += t.amount,
        }
    }
    grouped
        .into_iter()
        .map(|(key, (spent, received))| FlowBucket {
            key: key.to_string(),
            spent,
            received,
        })
        .collect()
}

pub fn bank_breakdown(records: &[&Transaction]) -> Vec<FlowBucket> {
    let mut grouped: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for t in records {
        let entry = grouped.entry(t.bank_name.as_str()).or_insert((0.0, 0.0));
        match t.direction {
            Direction::Spent => entry.0 += t.amount,
            Direction::Received => entry.1 += t.amount,
        }
    }
    grouped
        .into_iter()
        .map(|(key, (spent, received))| FlowBucket {
            key: key.to_string(),
            spent,
            received,
        })
        .collect()
}

/// Distinct `YYYY-MM` months, newest first.
pub fn available_months(records: &[Transaction]) -> Vec<String> {
    let months: BTreeSet<&str> = records.iter().map(Transaction::month).collect();
    months.into_iter().rev().map(str::to_string).collect()
}

pub fn available_banks(records: &[Transaction]) -> Vec<String> {
    let banks: BTreeSet<&str> = records
        .iter()
        .map(|t| t.bank_name.as_str())
        .filter(|b| !b.is_empty())
        .collect();
    banks.into_iter().map(str::to_string).collect()
}

/// Everything the dashboard shows for one filter selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Analytics {
    pub summary: Summary,
    pub tags: Vec<NamedValue>,
    pub trend: Vec<FlowBucket>,
    pub banks: Vec<FlowBucket>,
}

pub fn analyze(history: &[Transaction], filter: &AnalyticsFilter) -> Analytics {
    let records = filter_records(history, filter);
    Analytics {
        summary: summarize(&records),
        tags: tag_breakdown(&records),
        trend: trend(&records, filter),
        banks: bank_breakdown(&records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample;

    fn history() -> Vec<Transaction> {
        let mut food = sample("a", "2024-01-05", 100.0, Direction::Spent);
        food.tag = "Food".to_string();
        let salary = sample("b", "2024-01-10", 50.0, Direction::Received);
        let mut aws = sample("c", "2024-02-03", 30.0, Direction::Spent);
        aws.category = CategoryType::Office;
        aws.tag = "Software".to_string();
        aws.bank_name = "ICICI Bank".to_string();
        let mut lunch = sample("d", "2024-02-03", 20.0, Direction::Spent);
        lunch.tag = String::new();
        vec![food, salary, aws, lunch]
    }

    #[test]
    fn test_worked_example() {
        let records = history()[..2].to_vec();
        let all = AnalyticsFilter::default();
        let result = analyze(&records, &all);
        assert_eq!(result.summary.total_spent, 100.0);
        assert_eq!(result.summary.total_received, 50.0);
        assert_eq!(result.summary.personal_spending, 100.0);
        assert_eq!(result.summary.office_spending, 0.0);
        assert_eq!(
            result.tags,
            vec![NamedValue {
                name: "Food".to_string(),
                value: 100.0
            }]
        );
    }

    #[test]
    fn test_sum_identities() {
        let records = history();
        let refs: Vec<&Transaction> = records.iter().collect();
        let s = summarize(&refs);
        let spent: f64 = records
            .iter()
            .filter(|t| t.direction == Direction::Spent)
            .map(|t| t.amount)
            .sum();
        let received: f64 = records
            .iter()
            .filter(|t| t.direction == Direction::Received)
            .map(|t| t.amount)
            .sum();
        assert_eq!(s.total_spent, spent);
        assert_eq!(s.total_received, received);
        assert_eq!(s.personal_spending + s.office_spending, s.total_spent);
        assert_eq!(s.count, 4);
    }

    #[test]
    fn test_month_filter() {
        let records = history();
        let feb = AnalyticsFilter::new(Some("2024-02".into()), None);
        let filtered = filter_records(&records, &feb);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|t| t.date.starts_with("2024-02")));
    }

    #[test]
    fn test_all_filter_is_identity() {
        let records = history();
        let all = AnalyticsFilter::new(Some("All".into()), Some("all".into()));
        assert_eq!(all, AnalyticsFilter::default());
        assert_eq!(filter_records(&records, &all).len(), records.len());
    }

    #[test]
    fn test_bank_filter() {
        let records = history();
        let icici = AnalyticsFilter::new(None, Some("ICICI Bank".into()));
        let filtered = filter_records(&records, &icici);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "c");
    }

    #[test]
    fn test_tag_breakdown_sorted_and_defaults_blank_tags() {
        let records = history();
        let refs: Vec<&Transaction> = records.iter().collect();
        let tags = tag_breakdown(&refs);
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Food", "Software", "Uncategorized"]);
        assert!(tags.iter().all(|t| !t.name.is_empty() && t.value > 0.0));
    }

    #[test]
    fn test_tag_breakdown_groups_tags_as_stored() {
        let mut a = sample("a", "2024-01-05", 10.0, Direction::Spent);
        a.tag = "Food".to_string();
        let mut b = sample("b", "2024-01-06", 5.0, Direction::Spent);
        b.tag = "Food ".to_string();
        let refs = vec![&a, &b];
        let tags = tag_breakdown(&refs);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "Food");
        assert_eq!(tags[1].name, "Food ");
    }

    #[test]
    fn test_trend_buckets_by_month_then_by_date() {
        let records = history();
        let all = AnalyticsFilter::default();
        let refs: Vec<&Transaction> = records.iter().collect();
        let monthly = trend(&refs, &all);
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[0].key, "2024-01");
        assert_eq!(monthly[0].spent, 100.0);
        assert_eq!(monthly[0].received, 50.0);
        assert_eq!(monthly[1].key, "2024-02");
        assert_eq!(monthly[1].spent, 50.0);

        let jan = AnalyticsFilter::new(Some("2024-01".into()), None);
        let refs = filter_records(&records, &jan);
        let daily = trend(&refs, &jan);
        let keys: Vec<&str> = daily.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["2024-01-05", "2024-01-10"]);
    }

    #[test]
    fn test_bank_breakdown() {
        let records = history();
        let refs: Vec<&Transaction> = records.iter().collect();
        let banks = bank_breakdown(&refs);
        assert_eq!(banks.len(), 2);
        assert_eq!(banks[0].key, "HDFC Bank");
        assert_eq!(banks[0].spent, 120.0);
        assert_eq!(banks[0].received, 50.0);
        assert_eq!(banks[1].key, "ICICI Bank");
        assert_eq!(banks[1].spent, 30.0);
    }

    #[test]
    fn test_available_months_newest_first() {
        assert_eq!(available_months(&history()), vec!["2024-02", "2024-01"]);
        assert_eq!(available_banks(&history()), vec!["HDFC Bank", "ICICI Bank"]);
    }

    #[test]
    fn test_empty_history() {
        let result = analyze(&[], &AnalyticsFilter::default());
        assert_eq!(result.summary, Summary::default());
        assert!(result.tags.is_empty());
        assert!(result.trend.is_empty());
        assert!(result.banks.is_empty());
    }
}
