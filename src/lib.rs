use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Error};
use time::{
    format_description::BorrowedFormatItem, macros::format_description, Date, Duration,
    OffsetDateTime,
};
use tracing::{debug, info, warn};
use umya_spreadsheet::Spreadsheet;

pub type Result<T> = std::result::Result<T, Error>;

const ID_HEADER: &str = "ID";
const NAME_HEADER: &str = "Name";

const FRIDAY_INDEX: i64 = 4;
const PAY_START_OFFSET: i64 = 11;
const PAY_END_OFFSET: i64 = 6;
const DEAL_START_OFFSET: i64 = 18;
const DEAL_END_OFFSET: i64 = 13;

const EMPLOYEE_ID_CELL: &str = "B1";
const EMPLOYEE_NAME_CELL: &str = "B2";
const PAID_DATE_CELL: &str = "B3";
const PAY_PERIOD_CELL: &str = "B4";
const DEAL_PERIOD_CELL: &str = "B5";

static US_DATE_FMT: &[BorrowedFormatItem] = format_description!("[month]/[day]/[year]");
static ISO_DATE_FMT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

#[derive(Debug, thiserror::Error)]
pub enum PayrollError {
    #[error("failed to find {0} header in employee data")]
    MissingColumn(&'static str),
    #[error("employee {id} has name {name:?} without a first/last name separator")]
    UnsplittableName { id: String, name: String },
    #[error("template {0} has no worksheet")]
    EmptyTemplate(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    pub id: String,
    pub name: String,
}

impl Employee {
    /// Splits the name at its first space; anything after it is the last name.
    pub fn first_and_last_name(&self) -> Result<(&str, &str)> {
        self.name.split_once(' ').ok_or_else(|| {
            PayrollError::UnsplittableName {
                id: self.id.clone(),
                name: self.name.clone(),
            }
            .into()
        })
    }
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Date,
    pub end: Date,
}

impl DateRange {
    /// `MM/DD/YYYY to MM/DD/YYYY`
    pub fn label(&self) -> Result<String> {
        Ok(format!(
            "{} to {}",
            self.start.format(US_DATE_FMT)?,
            self.end.format(US_DATE_FMT)?
        ))
    }
}

/// Returns the first Friday on or after `today`.
///
/// The weekday index is counted from Monday (Monday = 0, Friday = 4). Monday
/// to Friday land on the Friday of the same week; Saturday and Sunday move
/// forward to the next Friday.
pub fn anchor_friday(today: Date) -> Date {
    let weekday_index = i64::from(today.weekday().number_days_from_monday());
    let days_until_friday = (FRIDAY_INDEX - weekday_index).rem_euclid(7);
    today.saturating_add(Duration::days(days_until_friday))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayrollCalendar {
    pub paid_date: Date,
    pub pay_period: DateRange,
    pub deal_period: DateRange,
}

impl PayrollCalendar {
    /// Pay period is last week's Monday to Saturday, deal period the same
    /// window one week earlier, both counted back from the anchor Friday.
    pub fn for_day(today: Date) -> Self {
        let paid_date = anchor_friday(today);
        let back = |days: i64| paid_date.saturating_sub(Duration::days(days));
        Self {
            paid_date,
            pay_period: DateRange {
                start: back(PAY_START_OFFSET),
                end: back(PAY_END_OFFSET),
            },
            deal_period: DateRange {
                start: back(DEAL_START_OFFSET),
                end: back(DEAL_END_OFFSET),
            },
        }
    }

    pub fn period_set(&self) -> Result<PeriodSet> {
        Ok(PeriodSet {
            pay_period: self.pay_period.label()?,
            deal_period: self.deal_period.label()?,
            paid_date: self.paid_date.format(US_DATE_FMT)?,
            file_date_tag: self.pay_period.start.format(ISO_DATE_FMT)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodSet {
    pub pay_period: String,
    pub deal_period: String,
    pub paid_date: String,
    pub file_date_tag: String,
}

pub fn compute_periods(today: Date) -> Result<PeriodSet> {
    PayrollCalendar::for_day(today).period_set()
}

pub fn parse_iso_date(s: &str) -> Result<Date> {
    Date::parse(s.trim(), &ISO_DATE_FMT)
        .with_context(|| format!("invalid date {s:?}, expected YYYY-MM-DD"))
}

pub fn local_today() -> Date {
    match OffsetDateTime::now_local() {
        Ok(now) => now.date(),
        Err(e) => {
            warn!("local offset unavailable ({e}), using UTC date");
            OffsetDateTime::now_utc().date()
        }
    }
}

fn get_column_indices(headers: &csv::StringRecord) -> Result<(usize, usize)> {
    let mut id_index: Option<usize> = None;
    let mut name_index: Option<usize> = None;
    headers
        .iter()
        .enumerate()
        .for_each(|(pos, h)| match h.trim() {
            ID_HEADER => id_index = Some(pos),
            NAME_HEADER => name_index = Some(pos),
            _ => {}
        });
    Ok((
        id_index.ok_or(PayrollError::MissingColumn(ID_HEADER))?,
        name_index.ok_or(PayrollError::MissingColumn(NAME_HEADER))?,
    ))
}

pub fn read_employees<P: AsRef<Path>>(file_path: P) -> Result<Vec<Employee>> {
    let file_path = file_path.as_ref();
    let mut rdr = csv::Reader::from_path(file_path)
        .with_context(|| format!("failed to open employee data {}", file_path.display()))?;
    let (id_index, name_index) = get_column_indices(rdr.headers()?)?;

    let mut employees = Vec::new();
    for record in rdr.records() {
        let record = record.context("malformed employee record")?;
        employees.push(Employee {
            id: record[id_index].to_string(),
            name: record[name_index].to_string(),
        });
    }
    debug!("read {} employees from {}", employees.len(), file_path.display());
    Ok(employees)
}

pub fn output_file_name(employee: &Employee, periods: &PeriodSet) -> Result<String> {
    let (first_name, last_name) = employee.first_and_last_name()?;
    Ok(format!(
        "{}_{}_{}.xlsx",
        first_name, last_name, periods.file_date_tag
    ))
}

pub fn clear_directory<P: AsRef<Path>>(directory: P) -> Result<()> {
    let directory = directory.as_ref();
    if directory.exists() {
        fs::remove_dir_all(directory)
            .with_context(|| format!("failed to remove {}", directory.display()))?;
    }
    fs::create_dir_all(directory)
        .with_context(|| format!("failed to create {}", directory.display()))?;
    Ok(())
}

/// Template workbook held in memory; every render stamps a copy of it, so
/// other sheets, styles and number formats carry over untouched.
#[derive(Debug, Clone)]
pub struct Template {
    spreadsheet: Spreadsheet,
}

impl Template {
    pub fn load<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let file_path = file_path.as_ref();
        let spreadsheet = umya_spreadsheet::reader::xlsx::read(file_path)
            .with_context(|| format!("failed to open template {}", file_path.display()))?;
        if spreadsheet.get_sheet_count() == 0 {
            return Err(PayrollError::EmptyTemplate(file_path.to_path_buf()).into());
        }
        debug!(
            "loaded template {} ({} sheets)",
            file_path.display(),
            spreadsheet.get_sheet_count()
        );
        Ok(Self { spreadsheet })
    }

    pub fn render<P: AsRef<Path>>(
        &self,
        employee: &Employee,
        periods: &PeriodSet,
        destination: P,
    ) -> Result<()> {
        let destination = destination.as_ref();
        let mut spreadsheet = self.spreadsheet.clone();
        let worksheet = spreadsheet
            .get_sheet_mut(&0)
            .context("template lost its first worksheet")?;

        for (cell, value) in [
            (EMPLOYEE_ID_CELL, &employee.id),
            (EMPLOYEE_NAME_CELL, &employee.name),
            (PAID_DATE_CELL, &periods.paid_date),
            (PAY_PERIOD_CELL, &periods.pay_period),
            (DEAL_PERIOD_CELL, &periods.deal_period),
        ] {
            worksheet.get_cell_mut(cell).set_value_string(value);
        }
        debug!("stamped sheet {} for {}", worksheet.get_name(), employee.id);

        umya_spreadsheet::writer::xlsx::write(&spreadsheet, destination)
            .with_context(|| format!("failed to save {}", destination.display()))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub template_path: PathBuf,
    pub output_dir: PathBuf,
}

/// Generates one spreadsheet per employee of the roster and returns the
/// written paths. The template is loaded before the output directory is
/// cleared, so a missing template leaves previous output in place.
pub fn generate_spreadsheets<P: AsRef<Path>>(
    roster_path: P,
    config: &RunConfig,
    today: Date,
) -> Result<Vec<PathBuf>> {
    let employees = read_employees(roster_path)?;
    let template = Template::load(&config.template_path)?;
    clear_directory(&config.output_dir)?;

    let periods = compute_periods(today)?;
    debug!(?periods, "computed periods for {today}");
    info!(
        "generating {} spreadsheets into {}",
        employees.len(),
        config.output_dir.display()
    );

    let mut written = Vec::with_capacity(employees.len());
    for employee in &employees {
        let path = config.output_dir.join(output_file_name(employee, &periods)?);
        template.render(employee, &periods, &path)?;
        info!("wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}
