use crate::metadata::{GeoLocation, ImageMetadata};
use crate::paths::{base_name, normalize_path};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Year,
    YearTaken,
    YearCreated,
    Month,
    MonthTaken,
    MonthCreated,
    Date,
    DateTaken,
    DateCreated,
    Parent,
    ParentIfNotDate,
    LocationHash,
    LocationCountry,
    LocationDivision,
    LocationCity,
    LocationPlace,
}

impl Placeholder {
    pub const ALL: [Placeholder; 16] = [
        Placeholder::Year,
        Placeholder::YearTaken,
        Placeholder::YearCreated,
        Placeholder::Month,
        Placeholder::MonthTaken,
        Placeholder::MonthCreated,
        Placeholder::Date,
        Placeholder::DateTaken,
        Placeholder::DateCreated,
        Placeholder::Parent,
        Placeholder::ParentIfNotDate,
        Placeholder::LocationHash,
        Placeholder::LocationCountry,
        Placeholder::LocationDivision,
        Placeholder::LocationCity,
        Placeholder::LocationPlace,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Placeholder::Year => "{year}",
            Placeholder::YearTaken => "{year_taken}",
            Placeholder::YearCreated => "{year_created}",
            Placeholder::Month => "{month}",
            Placeholder::MonthTaken => "{month_taken}",
            Placeholder::MonthCreated => "{month_created}",
            Placeholder::Date => "{date}",
            Placeholder::DateTaken => "{date_taken}",
            Placeholder::DateCreated => "{date_created}",
            Placeholder::Parent => "{parent}",
            Placeholder::ParentIfNotDate => "{parent_if_not_date}",
            Placeholder::LocationHash => "{location_hash}",
            Placeholder::LocationCountry => "{location_country}",
            Placeholder::LocationDivision => "{location_division}",
            Placeholder::LocationCity => "{location_city}",
            Placeholder::LocationPlace => "{location_place}",
        }
    }

    pub fn value(self, metadata: &ImageMetadata) -> &str {
        match self {
            Placeholder::Year => &metadata.year,
            Placeholder::YearTaken => &metadata.year_taken,
            Placeholder::YearCreated => &metadata.year_created,
            Placeholder::Month => &metadata.month,
            Placeholder::MonthTaken => &metadata.month_taken,
            Placeholder::MonthCreated => &metadata.month_created,
            Placeholder::Date => &metadata.date,
            Placeholder::DateTaken => &metadata.date_taken,
            Placeholder::DateCreated => &metadata.date_created,
            Placeholder::Parent => &metadata.parent,
            Placeholder::ParentIfNotDate => &metadata.parent_if_not_date,
            Placeholder::LocationHash => metadata.location_hash(),
            Placeholder::LocationCountry => metadata.location_country(),
            Placeholder::LocationDivision => metadata.location_division(),
            Placeholder::LocationCity => metadata.location_city(),
            Placeholder::LocationPlace => metadata.location_place(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("テンプレートが空です")]
    Empty,
    #[error("中括弧が閉じられていません (位置 {0})")]
    UnbalancedBraces(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleSubstitution {
    pub path: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct SampleMetadata {
    pub description: &'static str,
    pub metadata: ImageMetadata,
}

/// Renders `template` against `metadata` into a relative destination path
/// ending in the source file's base name.
///
/// Placeholders match case-insensitively in a single left-to-right pass, so
/// substituted values are never rescanned. Anything in braces that is not
/// one of the sixteen placeholders stays in the output verbatim.
pub fn render_path(template: &str, metadata: &ImageMetadata) -> String {
    let substituted = substitute(template, metadata);
    let joined = format!("{}/{}", substituted, base_name(&metadata.file_path));
    normalize_path(&joined).trim_start_matches('/').to_string()
}

fn substitute(template: &str, metadata: &ImageMetadata) -> String {
    let values = Placeholder::ALL.map(|p| (p.token(), p.value(metadata)));
    let bytes = template.as_bytes();
    let mut out = String::with_capacity(template.len());
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{' {
            let matched = values.iter().find(|(token, _)| {
                bytes
                    .get(i..i + token.len())
                    .is_some_and(|window| window.eq_ignore_ascii_case(token.as_bytes()))
            });
            if let Some((token, value)) = matched {
                out.push_str(&template[literal_start..i]);
                out.push_str(value);
                i += token.len();
                literal_start = i;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&template[literal_start..]);
    out
}

fn brace_group_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{[^{}]*\}").expect("static regex"))
}

/// Brace groups in `template` that are not known placeholders. They are
/// kept verbatim by [`render_path`].
pub fn unknown_placeholders(template: &str) -> Vec<String> {
    brace_group_pattern()
        .find_iter(template)
        .map(|m| m.as_str())
        .filter(|group| {
            !Placeholder::ALL
                .iter()
                .any(|p| p.token().eq_ignore_ascii_case(group))
        })
        .map(str::to_string)
        .collect()
}

pub fn validate_template(template: &str) -> Result<(), TemplateError> {
    if template.is_empty() {
        return Err(TemplateError::Empty);
    }
    let mut open: Option<usize> = None;
    for (index, ch) in template.char_indices() {
        match ch {
            '{' if open.is_some() => return Err(TemplateError::UnbalancedBraces(index)),
            '{' => open = Some(index),
            '}' => open = None,
            _ => {}
        }
    }
    match open {
        Some(index) => Err(TemplateError::UnbalancedBraces(index)),
        None => Ok(()),
    }
}

pub fn example_substitution(
    template: &str,
    metadata: &ImageMetadata,
    description: &str,
) -> ExampleSubstitution {
    ExampleSubstitution {
        path: render_path(template, metadata),
        description: description.to_string(),
    }
}

/// Three representative records for previewing a template, placed under
/// `destination`.
pub fn sample_metadata(destination: &str) -> Vec<SampleMetadata> {
    let root = destination.trim_end_matches('/');
    vec![
        SampleMetadata {
            description: "位置情報あり、撮影日と作成日が異なる",
            metadata: ImageMetadata {
                file_path: format!("{root}/Scottish Highlands/IMG_1234.jpg"),
                year: "2023".to_string(),
                year_taken: "2023".to_string(),
                year_created: "2023".to_string(),
                month: "04".to_string(),
                month_taken: "04".to_string(),
                month_created: "05".to_string(),
                date: "19".to_string(),
                date_taken: "19".to_string(),
                date_created: "15".to_string(),
                parent: "Scottish Highlands".to_string(),
                parent_if_not_date: "Scottish Highlands".to_string(),
                location: Some(GeoLocation {
                    geohash: "gfhptc9m".to_string(),
                    country: "GB".to_string(),
                    division: "Scotland".to_string(),
                    city: "Highlands".to_string(),
                    place: "Beinn Eighe National Nature Reserve".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            },
        },
        SampleMetadata {
            description: "EXIFなし、親フォルダが日付形式",
            metadata: ImageMetadata {
                file_path: format!("{root}/2011/07/23/IMG_1234.jpg"),
                year: "2011".to_string(),
                year_created: "2011".to_string(),
                month: "07".to_string(),
                month_created: "07".to_string(),
                date: "23".to_string(),
                date_created: "23".to_string(),
                parent: "23".to_string(),
                ..Default::default()
            },
        },
        SampleMetadata {
            description: "最小限の位置情報、親フォルダが日付形式、撮影日と作成日が異なる",
            metadata: ImageMetadata {
                file_path: format!("{root}/DCIM/Camera/2022-09-22/IMG_1234.jpg"),
                year: "2022".to_string(),
                year_taken: "2022".to_string(),
                year_created: "2022".to_string(),
                month: "09".to_string(),
                month_taken: "09".to_string(),
                month_created: "09".to_string(),
                date: "22".to_string(),
                date_taken: "22".to_string(),
                date_created: "23".to_string(),
                parent: "2022-09-22".to_string(),
                location: Some(GeoLocation {
                    geohash: "9q9hvumk".to_string(),
                    country: "US".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> ImageMetadata {
        ImageMetadata {
            file_path: "/in/beach/IMG_01.jpg".to_string(),
            year: "2020".to_string(),
            year_taken: "2020".to_string(),
            year_created: "2021".to_string(),
            month: "05".to_string(),
            month_created: "06".to_string(),
            date: "09".to_string(),
            parent: "beach".to_string(),
            parent_if_not_date: "beach".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn renders_year_month_parent() {
        let rendered = render_path("{year}/{month}/{parent}", &metadata());
        assert_eq!(rendered, "2020/05/beach/IMG_01.jpg");
    }

    #[test]
    fn placeholders_match_case_insensitively_everywhere() {
        let rendered = render_path("{Year}/{YEAR}-{mOnTh}/{year_CREATED}", &metadata());
        assert_eq!(rendered, "2020/2020-05/2021/IMG_01.jpg");
    }

    #[test]
    fn similar_prefixes_do_not_shadow_each_other() {
        let rendered = render_path("{parent_if_not_date}_{parent}/{date}{date_taken}", &metadata());
        assert_eq!(rendered, "beach_beach/09/IMG_01.jpg");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let mut meta = metadata();
        meta.parent = "{year}".to_string();
        let rendered = render_path("{parent}/{month}", &meta);
        assert_eq!(rendered, "{year}/05/IMG_01.jpg");
    }

    #[test]
    fn unknown_placeholders_stay_verbatim() {
        let rendered = render_path("{year}/{camera}", &metadata());
        assert_eq!(rendered, "2020/{camera}/IMG_01.jpg");
        assert_eq!(unknown_placeholders("{year}/{camera}/{Parent}"), vec!["{camera}"]);
    }

    #[test]
    fn empty_values_collapse_path_segments() {
        let rendered = render_path("{year}/{location_hash}/{month_taken}", &metadata());
        assert_eq!(rendered, "2020/IMG_01.jpg");
    }

    #[test]
    fn empty_template_places_file_at_root() {
        assert_eq!(render_path("", &metadata()), "IMG_01.jpg");
        assert_eq!(render_path("/", &metadata()), "IMG_01.jpg");
    }

    #[test]
    fn rendering_is_repeatable() {
        let meta = metadata();
        let template = "{year}/{YEAR}/{parent}/{unknown}/./x/../{date}";
        assert_eq!(render_path(template, &meta), render_path(template, &meta));
    }

    #[test]
    fn non_ascii_literals_survive() {
        let rendered = render_path("写真/{year}/é{month}", &metadata());
        assert_eq!(rendered, "写真/2020/é05/IMG_01.jpg");
    }

    #[test]
    fn vocabulary_has_sixteen_distinct_tokens() {
        let mut tokens: Vec<_> = Placeholder::ALL.iter().map(|p| p.token()).collect();
        tokens.sort();
        tokens.dedup();
        assert_eq!(tokens.len(), 16);
    }

    #[test]
    fn validate_template_flags_unclosed_braces() {
        assert_eq!(validate_template("{year}/{month}"), Ok(()));
        assert_eq!(validate_template("{year"), Err(TemplateError::UnbalancedBraces(0)));
        assert_eq!(
            validate_template("{ye{ar}"),
            Err(TemplateError::UnbalancedBraces(3))
        );
        assert_eq!(validate_template("plain}"), Ok(()));
        assert_eq!(validate_template(""), Err(TemplateError::Empty));
    }

    #[test]
    fn samples_preview_against_destination() {
        let samples = sample_metadata("/out/");
        assert_eq!(samples.len(), 3);
        let previews: Vec<_> = samples
            .iter()
            .map(|s| {
                example_substitution(
                    "{year}/{parent_if_not_date}/{location_country}",
                    &s.metadata,
                    s.description,
                )
            })
            .collect();
        assert_eq!(previews[0].path, "2023/Scottish Highlands/GB/IMG_1234.jpg");
        assert_eq!(previews[1].path, "2011/IMG_1234.jpg");
        assert_eq!(previews[2].path, "2022/US/IMG_1234.jpg");
        assert_eq!(previews[1].description, samples[1].description);
    }
}
