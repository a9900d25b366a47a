use chrono::{NaiveDate, NaiveDateTime};
use survey_metrics::submission::MAX_COMMENT_CHARS;
use survey_metrics::*;

fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, month, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn draft(unit: &str, user_type: &str, satisfaction: u8, recommendation: u8) -> SubmissionDraft {
    SubmissionDraft {
        unit: unit.to_string(),
        user_type: user_type.to_string(),
        contact_channel: "Balcão Virtual".to_string(),
        used_virtual_desk: true,
        dimension_scores: [Some(satisfaction); DIMENSION_COUNT],
        overall_satisfaction: Some(satisfaction),
        recommendation: Some(recommendation),
        ..SubmissionDraft::default()
    }
}

fn criteria(start: (u32, u32), end: (u32, u32)) -> FilterCriteria {
    FilterCriteria {
        start_date: NaiveDate::from_ymd_opt(2024, start.0, start.1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, end.0, end.1).unwrap(),
        unit: None,
        user_type: None,
    }
}

#[test]
fn submissions_feed_the_dashboard() {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = MemoryStore::new();
    let settings = DashboardSettings::default();

    let empty = build_dashboard(
        &store.load().unwrap(),
        &criteria((1, 1), (12, 31)),
        Granularity::Week,
        &settings,
    );
    assert_eq!(empty, Dashboard::NoResponses);

    record_submission(&store, &draft("Fortaleza", "Jurisdicionado", 5, 9), at(4, 1, 10)).unwrap();
    record_submission(&store, &draft("Fortaleza", "Advogado", 4, 7), at(4, 3, 15)).unwrap();
    record_submission(&store, &draft("Juazeiro do Norte", "Advogado", 2, 3), at(4, 9, 11)).unwrap();
    let mut lost = draft("Fortaleza", "Outro", 3, 8);
    lost.comment = "x".repeat(MAX_COMMENT_CHARS + 1);
    assert!(record_submission(&store, &lost, at(4, 10, 9)).is_err());

    let responses = store.load().unwrap();
    assert_eq!(responses.len(), 3);

    let report = match build_dashboard(
        &responses,
        &criteria((4, 1), (4, 30)),
        Granularity::Week,
        &settings,
    ) {
        Dashboard::Report(report) => report,
        other => panic!("unexpected dashboard {:?}", other),
    };
    assert_eq!(report.total_responses, 3);
    assert_eq!(report.recent.nps, Some(0.0));
    assert!(report.alerts.satisfaction_below_target);
    assert!(report.alerts.nps_below_target);
    // 2024-04-01 is a Monday.
    assert_eq!(
        report
            .timeline
            .iter()
            .map(|p| (p.period_start, p.response_count))
            .collect::<Vec<_>>(),
        vec![(at(4, 1, 0), 2), (at(4, 8, 0), 1)]
    );
    assert_eq!(report.by_unit[0].key, "Fortaleza");
    assert_eq!(report.by_unit[0].nps, Some(50.0));
    assert_eq!(report.by_user_type[0].key, "Advogado");
    assert_eq!(report.by_user_type[0].response_count, 2);
    assert_eq!(report.by_user_type[0].mean_satisfaction, Some(3.0));

    // The hearing dimension was never answered.
    let hearing = report
        .dimensions
        .iter()
        .find(|d| d.dimension == Dimension::HearingExperience)
        .unwrap();
    assert_eq!(hearing.mean, None);
    assert_eq!(
        report.dimensions.last().map(|d| d.dimension),
        Some(Dimension::HearingExperience)
    );
}

#[test]
fn selection_by_user_type_and_dates() {
    let store = MemoryStore::new();
    record_submission(&store, &draft("Fortaleza", "Advogado", 5, 10), at(5, 2, 9)).unwrap();
    record_submission(&store, &draft("Fortaleza", "Jurisdicionado", 1, 0), at(5, 2, 23)).unwrap();
    record_submission(&store, &draft("Fortaleza", "Advogado", 3, 6), at(5, 20, 9)).unwrap();
    let responses = store.load().unwrap();

    let mut selection = criteria((5, 2), (5, 2));
    selection.user_type = Some("Advogado".to_string());
    let settings = DashboardSettings::default();
    let report = match build_dashboard(&responses, &selection, Granularity::Day, &settings) {
        Dashboard::Report(report) => report,
        other => panic!("unexpected dashboard {:?}", other),
    };
    assert_eq!(report.total_responses, 1);
    assert_eq!(report.recent.mean_satisfaction, Some(5.0));
    assert!(!report.alerts.satisfaction_below_target);
    assert!(!report.alerts.nps_below_target);

    selection.unit = Some("Juazeiro do Norte".to_string());
    assert_eq!(
        build_dashboard(&responses, &selection, Granularity::Day, &settings),
        Dashboard::NoData
    );

    let options = filter_options(&responses);
    assert_eq!(options.units, vec!["Fortaleza".to_string()]);
    assert_eq!(
        options.user_types,
        vec!["Advogado".to_string(), "Jurisdicionado".to_string()]
    );
}
