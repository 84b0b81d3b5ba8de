use crate::domain::model::{MonthToMonthReport, MonthlyReportEntry, UserSubscription};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum SortOption {
    PriceHighLow,
    PriceLowHigh,
}

/// 依月費排序；None 保留伺服器回傳的順序
pub fn sort_subscriptions(
    subscriptions: &[UserSubscription],
    sort: Option<SortOption>,
) -> Vec<UserSubscription> {
    let mut sorted = subscriptions.to_vec();
    match sort {
        Some(SortOption::PriceHighLow) => {
            sorted.sort_by(|a, b| b.monthly_bill.total_cmp(&a.monthly_bill))
        }
        Some(SortOption::PriceLowHigh) => {
            sorted.sort_by(|a, b| a.monthly_bill.total_cmp(&b.monthly_bill))
        }
        None => {}
    }
    sorted
}

/// 距離到期日的天數（無條件進位）
pub fn days_until(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (due - now).num_milliseconds();
    let day = 86_400_000_i64;
    // 向上取整，負數時朝 0 靠近
    if millis > 0 {
        (millis + day - 1) / day
    } else {
        millis / day
    }
}

pub fn due_label(due: DateTime<Utc>, now: DateTime<Utc>) -> String {
    match days_until(due, now) {
        d if d < 0 => format!("{} days overdue", d.abs()),
        0 => "Due today".to_string(),
        1 => "Due tomorrow".to_string(),
        d => format!("Due in {} days", d),
    }
}

/// `$1,234`；有小數時最多兩位：`$12.5`
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    // 四捨五入後為 0 時不顯示負號
    let negative = amount < 0.0 && cents != 0;
    let whole = cents / 100;
    let fraction = cents % 100;

    let mut text = format!("${}", group_thousands(whole));
    if fraction != 0 {
        let decimals = format!("{:02}", fraction);
        text.push('.');
        text.push_str(decimals.trim_end_matches('0'));
    }

    if negative {
        format!("-{}", text)
    } else {
        text
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

pub fn monthly_total(subscriptions: &[UserSubscription]) -> f64 {
    subscriptions.iter().map(|s| s.monthly_bill).sum()
}

/// 月報表的摘要
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySummary {
    pub total_months: usize,
    pub total_spending: f64,
    pub highest_month: String,
    pub average_monthly: f64,
}

/// 沒有資料時回傳 None；最高月份相同金額時取較早的一筆
pub fn monthly_summary(entries: &[MonthlyReportEntry]) -> Option<MonthlySummary> {
    let first = entries.first()?;
    let highest = entries
        .iter()
        .fold(first, |max, item| if item.cost > max.cost { item } else { max });
    let total_spending: f64 = entries.iter().map(|e| e.cost).sum();

    Some(MonthlySummary {
        total_months: entries.len(),
        total_spending,
        highest_month: highest.month.clone(),
        average_monthly: total_spending / entries.len() as f64,
    })
}

/// "January" -> "Jan"
pub fn short_month(month: &str) -> String {
    month.chars().take(3).collect()
}

pub fn month_heading(report: &MonthToMonthReport) -> &str {
    report
        .subscriptions
        .first()
        .map(|item| item.month.as_str())
        .unwrap_or("Current Month")
}

/// 月對月報表的圖表資料：(標籤, 金額)
pub fn chart_points(report: &MonthToMonthReport) -> Vec<(String, f64)> {
    report
        .subscriptions
        .iter()
        .map(|item| {
            (
                format!("Subscription {}", item.subscription_channel_id),
                item.cost,
            )
        })
        .collect()
}
