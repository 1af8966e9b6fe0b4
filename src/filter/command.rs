//! Line-oriented commands for editing filters interactively.

use super::{FilterError, FilterState, YearRange};

/// Help text printed by the `help` command.
pub const HELP: &str = "\
Commands:
  region add|remove KEY       select or drop a subregion
  country add|remove ISO3     select or drop a country
  category add|remove LABEL   select or drop a hazard category
  years START END             set the year range
  clear                       drop every selection
  show                        print the current filters
  help                        print this help
  quit                        leave the session";

/// A parsed filter command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterCommand {
    AddRegion(String),
    RemoveRegion(String),
    AddCountry(String),
    RemoveCountry(String),
    AddCategory(String),
    RemoveCategory(String),
    Years(i32, i32),
    Clear,
    Show,
    Help,
    Quit,
}

impl FilterCommand {
    /// Parse one input line.
    pub fn parse(line: &str) -> Result<Self, FilterError> {
        let mut tokens = line.split_whitespace();
        let verb = tokens
            .next()
            .map(str::to_lowercase)
            .ok_or(FilterError::Usage("type `help` for a list of commands"))?;

        match verb.as_str() {
            "region" | "regions" => {
                let (add, key) = parse_edit(&mut tokens, "region add|remove KEY")?;
                Ok(if add {
                    FilterCommand::AddRegion(key)
                } else {
                    FilterCommand::RemoveRegion(key)
                })
            }
            "country" | "countries" => {
                let (add, iso3) = parse_edit(&mut tokens, "country add|remove ISO3")?;
                let iso3 = iso3.to_ascii_uppercase();
                Ok(if add {
                    FilterCommand::AddCountry(iso3)
                } else {
                    FilterCommand::RemoveCountry(iso3)
                })
            }
            "category" | "categories" => {
                let (add, label) = parse_edit(&mut tokens, "category add|remove LABEL")?;
                Ok(if add {
                    FilterCommand::AddCategory(label)
                } else {
                    FilterCommand::RemoveCategory(label)
                })
            }
            "years" | "year" => {
                const USAGE: &str = "years START END";
                let start = parse_year(tokens.next().ok_or(FilterError::Usage(USAGE))?)?;
                let end = parse_year(tokens.next().ok_or(FilterError::Usage(USAGE))?)?;
                if tokens.next().is_some() {
                    return Err(FilterError::Usage(USAGE));
                }
                Ok(FilterCommand::Years(start, end))
            }
            "clear" | "reset" => Ok(FilterCommand::Clear),
            "show" => Ok(FilterCommand::Show),
            "help" | "?" => Ok(FilterCommand::Help),
            "quit" | "exit" | "q" => Ok(FilterCommand::Quit),
            other => Err(FilterError::UnknownCommand(other.to_string())),
        }
    }

    /// Apply the command to `filter`.
    ///
    /// Returns `true` when the filter changed and data must be re-queried.
    /// Year ranges are clamped into `bounds`.
    pub fn apply(&self, filter: &mut FilterState, bounds: YearRange) -> Result<bool, FilterError> {
        let changed = match self {
            FilterCommand::AddRegion(key) => filter.add_region(key.clone()),
            FilterCommand::RemoveRegion(key) => filter.remove_region(key),
            FilterCommand::AddCountry(iso3) => filter.add_country(iso3.clone()),
            FilterCommand::RemoveCountry(iso3) => filter.remove_country(iso3),
            FilterCommand::AddCategory(label) => filter.add_category(label.clone()),
            FilterCommand::RemoveCategory(label) => filter.remove_category(label),
            FilterCommand::Years(start, end) => {
                let range = YearRange::new(*start, *end)?.clamp(bounds);
                filter.set_year_range(range)
            }
            FilterCommand::Clear => filter.clear_selections(),
            FilterCommand::Show | FilterCommand::Help | FilterCommand::Quit => false,
        };
        Ok(changed)
    }
}

/// Parse `add|remove VALUE...`; the value may contain spaces.
fn parse_edit<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    usage: &'static str,
) -> Result<(bool, String), FilterError> {
    let add = match tokens.next().map(str::to_lowercase).as_deref() {
        Some("add") | Some("+") => true,
        Some("remove") | Some("rm") | Some("-") => false,
        _ => return Err(FilterError::Usage(usage)),
    };

    let value = tokens.collect::<Vec<_>>().join(" ");
    if value.is_empty() {
        return Err(FilterError::Usage(usage));
    }

    Ok((add, value))
}

fn parse_year(token: &str) -> Result<i32, FilterError> {
    token
        .parse()
        .map_err(|_| FilterError::InvalidYear(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> YearRange {
        YearRange::new(2010, 2021).unwrap()
    }

    #[test]
    fn test_parse_edits() {
        assert_eq!(
            FilterCommand::parse("region add south-asia"),
            Ok(FilterCommand::AddRegion("south-asia".to_string()))
        );
        assert_eq!(
            FilterCommand::parse("country remove npl"),
            Ok(FilterCommand::RemoveCountry("NPL".to_string()))
        );
        assert_eq!(
            FilterCommand::parse("category add Wet mass movement"),
            Ok(FilterCommand::AddCategory("Wet mass movement".to_string()))
        );
    }

    #[test]
    fn test_parse_years_and_keywords() {
        assert_eq!(
            FilterCommand::parse("years 2012 2016"),
            Ok(FilterCommand::Years(2012, 2016))
        );
        assert_eq!(FilterCommand::parse("  CLEAR "), Ok(FilterCommand::Clear));
        assert_eq!(FilterCommand::parse("quit"), Ok(FilterCommand::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            FilterCommand::parse("zoom in"),
            Err(FilterError::UnknownCommand("zoom".to_string()))
        );
        assert!(matches!(
            FilterCommand::parse("region add"),
            Err(FilterError::Usage(_))
        ));
        assert!(matches!(
            FilterCommand::parse("region toggle pacific"),
            Err(FilterError::Usage(_))
        ));
        assert_eq!(
            FilterCommand::parse("years 2012 later"),
            Err(FilterError::InvalidYear("later".to_string()))
        );
        assert!(FilterCommand::parse("").is_err());
    }

    #[test]
    fn test_apply_reports_changes() {
        let mut filter = FilterState::new(bounds());

        let add = FilterCommand::AddCountry("BGD".to_string());
        assert_eq!(add.apply(&mut filter, bounds()), Ok(true));
        assert_eq!(add.apply(&mut filter, bounds()), Ok(false));

        assert_eq!(FilterCommand::Show.apply(&mut filter, bounds()), Ok(false));
        assert_eq!(FilterCommand::Clear.apply(&mut filter, bounds()), Ok(true));
        assert!(filter.has_no_location());
    }

    #[test]
    fn test_apply_years_clamps_and_validates() {
        let mut filter = FilterState::new(bounds());

        let changed = FilterCommand::Years(2005, 2015)
            .apply(&mut filter, bounds())
            .unwrap();
        assert!(changed);
        assert_eq!(filter.year_range, YearRange::new(2010, 2015).unwrap());

        let err = FilterCommand::Years(2018, 2011).apply(&mut filter, bounds());
        assert!(matches!(err, Err(FilterError::InvertedRange { .. })));
        assert_eq!(filter.year_range, YearRange::new(2010, 2015).unwrap());
    }
}
