use super::*;

const BODY: f32 = 8.0;
const BRAND: f32 = 11.04;
const REGION: f32 = 21.95;

fn classifier() -> LineClassifier {
    LineClassifier::new(Calibration::default()).expect("default calibration is valid")
}

fn page_of(page_number: usize, lines: &[(&str, f32)]) -> PageFragments {
    PageFragments {
        page_number,
        fragments: lines
            .iter()
            .enumerate()
            .map(|(index, (text, size))| {
                PositionedFragment::new(40.0 + index as f32 * 14.0, 36.0, text, *size)
            })
            .collect(),
    }
}

fn logical(text: &str) -> LogicalLine {
    LogicalLine {
        page: 1,
        top: 0.0,
        text: text.to_string(),
        font_sizes: vec![BODY],
    }
}

fn logical_lines(texts: &[&str]) -> Vec<LogicalLine> {
    texts.iter().map(|text| logical(text)).collect()
}

fn extract(pages: &[PageFragments]) -> ExtractionReport {
    extract_records(pages, &classifier(), 80)
}

#[test]
fn assemble_lines_merges_jittered_fragments_left_to_right() {
    let page = PageFragments {
        page_number: 3,
        fragments: vec![
            PositionedFragment::new(130.0, 36.0, "12345", BODY),
            PositionedFragment::new(100.2, 90.0, "Chardonnay", 12.0),
            PositionedFragment::new(99.9, 36.0, "Estate", BODY),
            PositionedFragment::new(100.1, 60.0, "   ", BODY),
        ],
    };

    let lines = assemble_lines(&page, 1.0);

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].text, "Estate Chardonnay");
    assert_eq!(lines[0].page, 3);
    assert_eq!(lines[0].top, 99.9);
    assert_eq!(lines[0].font_sizes, vec![BODY, 12.0]);
    assert_eq!(lines[0].largest_font_size(), 12.0);
    assert_eq!(lines[1].text, "12345");
}

#[test]
fn assemble_lines_keeps_distinct_buckets_in_vertical_order() {
    let page = PageFragments {
        page_number: 1,
        fragments: vec![
            PositionedFragment::new(220.0, 36.0, "third", BODY),
            PositionedFragment::new(20.0, 36.0, "first", BODY),
            PositionedFragment::new(118.0, 36.0, "second", BODY),
        ],
    };

    let texts = assemble_lines(&page, 1.0)
        .into_iter()
        .map(|line| line.text)
        .collect::<Vec<String>>();
    assert_eq!(texts, vec!["first", "second", "third"]);
}

#[test]
fn item_grammar_matches_merged_line_verbatim() {
    let grammar = ItemGrammar::new().expect("grammar compiles");
    let lines = logical_lines(&["12345 2021 12/750ML 120.00 11.00"]);

    let matched = grammar.match_at(&lines, 0, &Calibration::default());

    assert_eq!(
        matched,
        GrammarMatch::Matched {
            fields: ItemFields {
                item_number: "12345".to_string(),
                vintage: "2021".to_string(),
                bottles_per_case: 12,
                bottle_size: "750ML".to_string(),
                case_price: "120.00".to_string(),
                bottle_price: Some("11.00".to_string()),
            },
            line_count: 1,
            strategy: GrammarStrategy::Merged,
        }
    );
}

#[test]
fn item_grammar_joins_split_lines_and_stops_before_discount() {
    let grammar = ItemGrammar::new().expect("grammar compiles");
    let lines = logical_lines(&["12345", "2021", "12/750ML", "120.00 11.00", "$5.00 on 10cs"]);

    match grammar.match_at(&lines, 0, &Calibration::default()) {
        GrammarMatch::Matched {
            fields,
            line_count,
            strategy,
        } => {
            assert_eq!(line_count, 4);
            assert_eq!(strategy, GrammarStrategy::Split);
            assert_eq!(fields.case_price, "120.00");
            assert_eq!(fields.bottle_price.as_deref(), Some("11.00"));
        }
        other => panic!("expected a split match, got {other:?}"),
    }
}

#[test]
fn item_grammar_takes_bottle_price_from_fifth_line() {
    let grammar = ItemGrammar::new().expect("grammar compiles");
    let lines = logical_lines(&["54321", "NV", "6/1.5L", "300.00", "26.00"]);

    match grammar.match_at(&lines, 0, &Calibration::default()) {
        GrammarMatch::Matched {
            fields, line_count, ..
        } => {
            assert_eq!(line_count, 5);
            assert_eq!(fields.vintage, "NV");
            assert_eq!(fields.bottles_per_case, 6);
            assert_eq!(fields.bottle_size, "1.5L");
            assert_eq!(fields.bottle_price.as_deref(), Some("26.00"));
        }
        other => panic!("expected a split match, got {other:?}"),
    }
}

#[test]
fn item_grammar_reports_malformed_fields_instead_of_matching() {
    let grammar = ItemGrammar::new().expect("grammar compiles");
    let calibration = Calibration::default();

    let odd_case = logical_lines(&["12345 2021 5/750ML 120.00"]);
    assert!(matches!(
        grammar.match_at(&odd_case, 0, &calibration),
        GrammarMatch::Malformed { .. }
    ));

    let old_vintage = logical_lines(&["12345 1850 12/750ML 99.00"]);
    assert!(matches!(
        grammar.match_at(&old_vintage, 0, &calibration),
        GrammarMatch::Malformed { .. }
    ));

    let incomplete = logical_lines(&["12345", "Estate Chardonnay"]);
    assert!(matches!(
        grammar.match_at(&incomplete, 0, &calibration),
        GrammarMatch::Malformed { .. }
    ));

    let padded_case = logical_lines(&["12345 2021 012/750ML 120.00"]);
    assert!(matches!(
        grammar.match_at(&padded_case, 0, &calibration),
        GrammarMatch::Malformed { .. }
    ));

    let not_item = logical_lines(&["Estate Chardonnay 2021"]);
    assert_eq!(
        grammar.match_at(&not_item, 0, &calibration),
        GrammarMatch::NotItem
    );
}

#[test]
fn classifier_applies_precedence_in_order() {
    let classifier = classifier();
    let captions = HashSet::new();
    let role_of = |text: &str, size: f32| {
        let lines = vec![LogicalLine {
            page: 1,
            top: 0.0,
            text: text.to_string(),
            font_sizes: vec![size],
        }];
        classifier.classify(&lines, 0, &captions).role
    };

    assert_eq!(
        role_of("ROYAL WINE CORP", REGION),
        LineRole::Skip {
            kind: SkipKind::Boilerplate
        }
    );
    assert_eq!(
        role_of("new", BODY),
        LineRole::Skip {
            kind: SkipKind::Badge
        }
    );
    assert_eq!(role_of("CALIFORNIA", REGION), LineRole::Region);
    assert_eq!(role_of("HAGAFEN CELLARS", BRAND), LineRole::Brand);
    assert_eq!(role_of("$5.00 on 10cs: 115.00/10.50", BODY), LineRole::Discount);
    assert_eq!(
        role_of("Gift Pack with 2 glasses", BODY),
        LineRole::Noise {
            kind: NoiseKind::Marketing
        }
    );
    assert_eq!(
        role_of("92 PTS Wine Spectator", BODY),
        LineRole::Noise {
            kind: NoiseKind::Marketing
        }
    );
    assert_eq!(
        role_of("12/750ML", BODY),
        LineRole::Noise {
            kind: NoiseKind::StrayField
        }
    );
    assert_eq!(role_of("Estate Chardonnay", BODY), LineRole::FreeText);
}

#[test]
fn classifier_does_not_treat_long_large_lines_as_headings() {
    let classifier = classifier();
    let lines = vec![LogicalLine {
        page: 1,
        top: 0.0,
        text: "one two three four five six seven eight nine".to_string(),
        font_sizes: vec![BODY, REGION],
    }];

    let classification = classifier.classify(&lines, 0, &HashSet::new());
    assert_eq!(classification.role, LineRole::FreeText);
}

#[test]
fn end_to_end_scenario_builds_one_complete_record() {
    let page = page_of(
        1,
        &[
            ("CALIFORNIA", REGION),
            ("HAGAFEN CELLARS", BRAND),
            ("Estate Chardonnay", BODY),
            ("12345", BODY),
            ("2021", BODY),
            ("12/750ML", BODY),
            ("120.00 11.00", BODY),
            ("$5.00 on 10cs", BODY),
        ],
    );

    let report = extract(&[page]);

    assert_eq!(report.status(), ExtractionStatus::Extracted);
    assert_eq!(
        report.records,
        vec![Record {
            page: 1,
            region: Some("CALIFORNIA".to_string()),
            brand: Some("HAGAFEN CELLARS".to_string()),
            item_number: "12345".to_string(),
            vintage: "2021".to_string(),
            product_name: "Estate Chardonnay".to_string(),
            bottles_per_case: 12,
            bottle_size: "750ML".to_string(),
            case_price: "120.00".to_string(),
            bottle_price: Some("11.00".to_string()),
            discounts: vec!["$5.00 on 10cs".to_string()],
            name_inferred: false,
        }]
    );
    assert!(report.diagnostics.unmatched_item_lines.is_empty());
    assert!(report.line_preview.is_empty());
}

#[test]
fn region_and_brand_carry_forward_until_replaced() {
    let page = page_of(
        1,
        &[
            ("REGION_A", REGION),
            ("BRAND_X", BRAND),
            ("Name One", BODY),
            ("11111 2020 12/750ML 100.00 9.00", BODY),
            ("Name Two", BODY),
            ("22222 2019 6/750ML 150.00 26.00", BODY),
            ("BRAND_Y", BRAND),
            ("Name Three", BODY),
            ("33333 NV 12/750ML 80.00 7.00", BODY),
        ],
    );

    let report = extract(&[page]);
    let context = report
        .records
        .iter()
        .map(|record| (record.region_label(), record.brand_label()))
        .collect::<Vec<(&str, &str)>>();

    assert_eq!(
        context,
        vec![
            ("REGION_A", "BRAND_X"),
            ("REGION_A", "BRAND_X"),
            ("REGION_A", "BRAND_Y"),
        ]
    );
}

#[test]
fn context_persists_across_pages() {
    let first = page_of(1, &[("ISRAEL", REGION), ("CARMEL", BRAND)]);
    let second = page_of(2, &[("Private Collection", BODY), ("44444 2020 12/750ML 90.00 8.00", BODY)]);

    let report = extract(&[first, second]);

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].page, 2);
    assert_eq!(report.records[0].region.as_deref(), Some("ISRAEL"));
    assert_eq!(report.records[0].brand.as_deref(), Some("CARMEL"));
}

#[test]
fn discounts_attach_only_to_contiguous_run() {
    let page = page_of(
        1,
        &[
            ("BRAND_X", BRAND),
            ("First Wine", BODY),
            ("11111 2020 12/750ML 100.00 9.00", BODY),
            ("$5.00 on 5cs", BODY),
            ("$8.00 on 10cs: 92.00/8.25", BODY),
            ("BRAND_Y", BRAND),
            ("Second Wine", BODY),
            ("22222 2021 12/750ML 110.00 10.00", BODY),
            ("$4.00 on 3cs", BODY),
        ],
    );

    let report = extract(&[page]);

    assert_eq!(report.records.len(), 2);
    assert_eq!(
        report.records[0].discounts,
        vec!["$5.00 on 5cs", "$8.00 on 10cs: 92.00/8.25"]
    );
    assert_eq!(report.records[1].discounts, vec!["$4.00 on 3cs"]);
    assert_eq!(report.discount_count(), 3);
    assert!(report.diagnostics.orphan_discounts.is_empty());
}

#[test]
fn interrupted_discount_is_reported_as_orphan() {
    let page = page_of(
        1,
        &[
            ("$1.00 on 2cs", BODY),
            ("First Wine", BODY),
            ("11111 2020 12/750ML 100.00 9.00", BODY),
            ("$5.00 on 5cs", BODY),
            ("Gift Pack", BODY),
            ("$9.00 on 20cs", BODY),
        ],
    );

    let report = extract(&[page]);

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].discounts, vec!["$5.00 on 5cs"]);
    assert_eq!(
        report.diagnostics.orphan_discounts,
        vec![
            OrphanDiscount {
                page: 1,
                text: "$1.00 on 2cs".to_string(),
            },
            OrphanDiscount {
                page: 1,
                text: "$9.00 on 20cs".to_string(),
            },
        ]
    );
}

#[test]
fn discount_run_does_not_cross_page_boundary() {
    let first = page_of(1, &[("Wine", BODY), ("11111 2020 12/750ML 100.00 9.00", BODY)]);
    let second = page_of(2, &[("$5.00 on 5cs", BODY)]);

    let report = extract(&[first, second]);

    assert!(report.records[0].discounts.is_empty());
    assert_eq!(report.diagnostics.orphan_discounts.len(), 1);
}

#[test]
fn name_falls_back_within_brand_and_resets_on_brand_change() {
    let page = page_of(
        1,
        &[
            ("BRAND_X", BRAND),
            ("Chateau X", BODY),
            ("11111 2020 12/750ML 100.00 9.00", BODY),
            ("22222 2021 12/750ML 105.00 9.50", BODY),
            ("BRAND_Y", BRAND),
            ("33333 2021 6/750ML 60.00 11.00", BODY),
        ],
    );

    let report = extract(&[page]);
    let names = report
        .records
        .iter()
        .map(|record| (record.product_name.as_str(), record.name_inferred))
        .collect::<Vec<(&str, bool)>>();

    assert_eq!(
        names,
        vec![
            ("Chateau X", false),
            ("Chateau X", true),
            (MISSING_NAME, true),
        ]
    );
    assert_eq!(report.inferred_name_count(), 2);
    assert_eq!(report.missing_name_count(), 1);
}

#[test]
fn name_lookback_joins_lines_and_steps_over_new_badge() {
    let page = page_of(
        1,
        &[
            ("BRAND_X", BRAND),
            ("Hagafen", BODY),
            ("Estate Chardonnay", BODY),
            ("NEW", BODY),
            ("11111 2020 12/750ML 100.00 9.00", BODY),
        ],
    );

    let report = extract(&[page]);

    assert_eq!(report.records[0].product_name, "Hagafen Estate Chardonnay");
    assert!(!report.records[0].name_inferred);
}

#[test]
fn name_lookback_stops_at_boilerplate_and_respects_window() {
    let page = page_of(
        1,
        &[
            ("TEL: 718-384-2400", BODY),
            ("Reserve", BODY),
            ("Cabernet", BODY),
            ("Sauvignon", BODY),
            ("11111 2020 12/750ML 100.00 9.00", BODY),
        ],
    );

    let full = extract(&[page.clone()]);
    assert_eq!(full.records[0].product_name, "Reserve Cabernet Sauvignon");

    let calibration = Calibration {
        name_lookback_lines: 2,
        ..Calibration::default()
    };
    let narrow = LineClassifier::new(calibration).expect("calibration is valid");
    let report = extract_records(&[page], &narrow, 80);
    assert_eq!(report.records[0].product_name, "Cabernet Sauvignon");
}

#[test]
fn marketing_lines_never_become_names() {
    let page = page_of(
        1,
        &[
            ("BRAND_X", BRAND),
            ("Moscato", BODY),
            ("11111 2020 12/750ML 100.00 9.00", BODY),
            ("GIFT PACK WITH 2 GLASSES", BODY),
            ("22222 2020 12/750ML 100.00 9.00", BODY),
        ],
    );

    let report = extract(&[page]);

    assert_eq!(report.records[1].product_name, "Moscato");
    assert!(report.records[1].name_inferred);
}

#[test]
fn name_lookback_steps_over_combine_notice() {
    let page = page_of(
        1,
        &[
            ("BRAND_X", BRAND),
            ("Estate Red", BODY),
            ("COMBINE 5 CS", BODY),
            ("11111 2020 12/750ML 100.00 9.00", BODY),
        ],
    );

    let report = extract(&[page]);

    assert_eq!(report.records[0].product_name, "Estate Red");
    assert!(!report.records[0].name_inferred);

    let classifier = classifier();
    let lines = logical_lines(&["Combine with any Moscato"]);
    assert_eq!(
        classifier.classify(&lines, 0, &HashSet::new()).role,
        LineRole::Noise {
            kind: NoiseKind::Badge
        }
    );
}

#[test]
fn malformed_item_is_skipped_and_counted() {
    let page = page_of(
        1,
        &[
            ("Odd Case", BODY),
            ("12345 2021 5/750ML 120.00", BODY),
            ("Rose", BODY),
            ("23456 2022 12/750ML 90.00 8.00", BODY),
        ],
    );

    let report = extract(&[page]);

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].item_number, "23456");
    assert_eq!(report.records[0].product_name, "Rose");
    assert_eq!(report.diagnostics.unmatched_item_lines.len(), 1);
    assert_eq!(
        report.diagnostics.unmatched_item_lines[0].text,
        "12345 2021 5/750ML 120.00"
    );
}

#[test]
fn single_bottle_case_reuses_case_price() {
    let page = page_of(1, &[("Magnum", BODY), ("34567 2018 1/3L 250.00", BODY)]);

    let report = extract(&[page]);

    assert_eq!(report.records[0].bottle_price.as_deref(), Some("250.00"));

    let page = page_of(1, &[("Half", BODY), ("34568 2018 12/375ML 96.00", BODY)]);
    let report = extract(&[page]);
    assert_eq!(report.records[0].bottle_price, None);
}

#[test]
fn boilerplate_only_page_is_empty_not_error() {
    let page = page_of(
        1,
        &[
            ("ROYAL WINE CORP", BRAND),
            ("ORDER DEPT 1-800-000-0000", BODY),
            ("FAX: 718-000-0000", BODY),
        ],
    );

    let report = extract(&[page]);

    assert_eq!(report.status(), ExtractionStatus::Empty);
    assert!(report.records.is_empty());
    assert_eq!(report.line_preview.len(), 3);
    assert!(report.line_preview[0].starts_with("ROYAL WINE CORP  | Sizes: [11.04] | skip"));
}

#[test]
fn extraction_is_idempotent() {
    let pages = vec![
        page_of(
            1,
            &[
                ("FRANCE", REGION),
                ("BARON HERZOG", BRAND),
                ("Chenin Blanc", BODY),
                ("11111 2022 12/750ML 72.00 6.50", BODY),
                ("$3.00 on 5cs", BODY),
            ],
        ),
        page_of(2, &[("22222 2021 12/750ML 80.00 7.00", BODY)]),
    ];

    let first = extract(&pages);
    let second = extract(&pages);

    assert_eq!(first.records, second.records);
    assert_eq!(
        first.diagnostics.orphan_discounts,
        second.diagnostics.orphan_discounts
    );
}

#[test]
fn repeated_page_captions_are_skipped() {
    let pages = (1..=3)
        .map(|number| {
            let brand = format!("BRAND {number}");
            let name = format!("Wine Number {number}");
            let item = format!("1111{number} 2020 12/750ML 100.00 9.00");
            page_of(
                number,
                &[
                    ("ITEM VINTAGE SIZE CASE BOTTLE", BODY),
                    (brand.as_str(), BRAND),
                    (name.as_str(), BODY),
                    (item.as_str(), BODY),
                    ("Prices subject to change", BODY),
                ],
            )
        })
        .collect::<Vec<PageFragments>>();

    let report = extract(&pages);
    assert_eq!(
        report.diagnostics.repeated_captions,
        vec![
            "item vintage size case bottle".to_string(),
            "prices subject to change".to_string(),
        ]
    );
    assert_eq!(report.diagnostics.caption_line_count, 6);
    assert_eq!(report.records[2].product_name, "Wine Number 3");

    let calibration = Calibration {
        repeated_edge_min_pages: 0,
        ..Calibration::default()
    };
    let no_captions = LineClassifier::new(calibration).expect("calibration is valid");
    let report = extract_records(&pages, &no_captions, 80);
    assert!(report.diagnostics.repeated_captions.is_empty());
    assert_eq!(report.diagnostics.caption_line_count, 0);
}

#[test]
fn product_names_repeated_at_page_edges_are_kept() {
    let pages = (1..=3)
        .map(|number| {
            let brand = format!("BRAND {number}");
            page_of(
                number,
                &[
                    (brand.as_str(), BRAND),
                    ("Cabernet Sauvignon", BODY),
                    ("12345 2020 12/750ML 100.00 9.00", BODY),
                    ("Merlot Reserve", BODY),
                    ("12346 2021 12/750ML 110.00 10.00", BODY),
                ],
            )
        })
        .collect::<Vec<PageFragments>>();

    let report = extract(&pages);

    assert!(report.diagnostics.repeated_captions.is_empty());
    assert_eq!(report.records.len(), 6);
    for pair in report.records.chunks(2) {
        assert_eq!(pair[0].product_name, "Cabernet Sauvignon");
        assert_eq!(pair[1].product_name, "Merlot Reserve");
        assert!(!pair[0].name_inferred);
        assert!(!pair[1].name_inferred);
    }
}

#[test]
fn edge_line_that_names_a_product_elsewhere_is_not_a_caption() {
    let mut pages = (1..=3)
        .map(|number| {
            let brand = format!("BRAND {number}");
            page_of(
                number,
                &[
                    ("Kosher for Passover", BODY),
                    (brand.as_str(), BRAND),
                    ("Rose", BODY),
                    ("22222 2022 12/750ML 90.00 8.00", BODY),
                ],
            )
        })
        .collect::<Vec<PageFragments>>();
    pages.push(page_of(
        4,
        &[
            ("BRAND 4", BRAND),
            ("Moscato", BODY),
            ("33333 2022 12/750ML 70.00 6.50", BODY),
            ("Kosher for Passover", BODY),
            ("44444 2022 12/750ML 75.00 7.00", BODY),
        ],
    ));

    let report = extract(&pages);

    assert!(report.diagnostics.repeated_captions.is_empty());
    assert_eq!(report.records[4].product_name, "Kosher for Passover");
    assert!(!report.records[4].name_inferred);
}

#[test]
fn stitcher_closes_discount_run_at_page_end() {
    let classifier = classifier();
    let lines = assemble_lines(
        &page_of(
            1,
            &[
                ("Wine", BODY),
                ("11111 2020 12/750ML 100.00 9.00", BODY),
                ("$5.00 on 5cs", BODY),
            ],
        ),
        1.0,
    );
    let classified = classifier.classify_page(&lines, &HashSet::new()).lines;

    let mut stitcher = RecordStitcher::new(9);
    assert_eq!(stitcher.state(), StitcherState::NoRecord);
    stitcher.consume_page(&classified[..2]);
    assert_eq!(stitcher.state(), StitcherState::NoRecord);
    assert_eq!(stitcher.context(), &CarriedContext::default());

    stitcher.consume_page(&classified[2..]);
    let outcome = stitcher.finish();
    assert_eq!(outcome.records.len(), 1);
    assert!(outcome.records[0].discounts.is_empty());
    assert_eq!(outcome.orphan_discounts.len(), 1);
}

#[test]
fn name_resolver_remembers_last_direct_name() {
    let mut resolver = NameResolver::default();

    assert_eq!(
        resolver.resolve(""),
        ResolvedName {
            name: MISSING_NAME.to_string(),
            inferred: true,
        }
    );
    assert!(!resolver.resolve("  Chateau X ").inferred);
    assert_eq!(resolver.resolve("").name, "Chateau X");

    resolver.reset();
    assert_eq!(resolver.resolve("").name, MISSING_NAME);
}

#[test]
fn parse_bbox_layout_reads_words_per_page() {
    let xhtml = r#"<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<body>
<doc>
  <page width="612.000000" height="792.000000">
    <flow><block xMin="36.0" yMin="100.0" xMax="200.0" yMax="111.04">
      <line xMin="36.0" yMin="100.0" xMax="200.0" yMax="111.04">
        <word xMin="36.000000" yMin="100.000000" xMax="80.000000" yMax="111.040000">Smith</word>
        <word xMin="82.000000" yMin="100.000000" xMax="90.000000" yMax="111.040000">&amp;</word>
        <word xMin="92.000000" yMin="100.000000" xMax="130.000000" yMax="111.040000">Sons</word>
      </line>
    </block></flow>
  </page>
  <page width="612.000000" height="792.000000">
    <flow><block xMin="36.0" yMin="50.0" xMax="80.0" yMax="58.0">
      <line xMin="36.0" yMin="50.0" xMax="80.0" yMax="58.0">
        <word xMin="36.000000" yMin="50.000000" xMax="80.000000" yMax="58.000000">12345</word>
      </line>
    </block></flow>
  </page>
</doc>
</body>
</html>"#;

    let pages = parse_bbox_layout(xhtml).expect("bbox layout parses");

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].page_number, 1);
    assert_eq!(pages[0].fragments.len(), 3);
    assert_eq!(pages[0].fragments[1].text, "&");
    assert!((pages[0].fragments[0].font_size - 11.04).abs() < 0.01);
    assert_eq!(pages[1].page_number, 2);
    assert_eq!(pages[1].fragments[0].text, "12345");

    let lines = assemble_lines(&pages[0], 1.0);
    assert_eq!(lines[0].text, "Smith & Sons");
}

#[test]
fn fragment_pages_deserialize_with_optional_family() {
    let raw = r#"[
      {"page_number": 1, "fragments": [
        {"top": 10.0, "left": 5.0, "text": "CALIFORNIA", "font_size": 21.95},
        {"top": 30.0, "left": 5.0, "text": "Rose", "font_size": 8.0, "font_family": "Helvetica"}
      ]}
    ]"#;

    let pages: Vec<PageFragments> = serde_json::from_str(raw).expect("fragments deserialize");

    assert_eq!(pages[0].fragments[0].font_family, None);
    assert_eq!(
        pages[0].fragments[1].font_family.as_deref(),
        Some("Helvetica")
    );
}

#[test]
fn document_format_resolves_from_extension_or_flag() {
    assert_eq!(
        DocumentFormat::resolve(Path::new("list.PDF"), InputFormat::Auto).expect("pdf"),
        DocumentFormat::Pdf
    );
    assert_eq!(
        DocumentFormat::resolve(Path::new("list.json"), InputFormat::Auto).expect("json"),
        DocumentFormat::Fragments
    );
    assert!(DocumentFormat::resolve(Path::new("list.xlsx"), InputFormat::Auto).is_err());
    assert_eq!(DocumentFormat::from_path(Path::new("list.xlsx")), None);
    assert_eq!(
        DocumentFormat::resolve(Path::new("list.xlsx"), InputFormat::Fragments).expect("flag"),
        DocumentFormat::Fragments
    );
}

#[test]
fn calibration_profile_fills_missing_fields_with_defaults() {
    let calibration: Calibration =
        serde_json::from_str(r#"{"region_font_size": 18.0, "valid_bottles_per_case": [6, 12]}"#)
            .expect("partial profile deserializes");

    assert_eq!(calibration.region_font_size, 18.0);
    assert_eq!(calibration.brand_font_size, 11.04);
    assert_eq!(calibration.valid_bottles_per_case, vec![6, 12]);
    assert!(calibration.validate().is_ok());

    let overridden = calibration.with_overrides(None, Some(12.5), Some(4));
    assert_eq!(overridden.brand_font_size, 12.5);
    assert_eq!(overridden.name_lookback_lines, 4);
}

#[test]
fn calibration_validation_rejects_inverted_thresholds() {
    let calibration = Calibration {
        brand_font_size: 24.0,
        ..Calibration::default()
    };
    assert!(calibration.validate().is_err());
    assert!(LineClassifier::new(calibration).is_err());

    let calibration = Calibration {
        marketing_patterns: vec!["(unclosed".to_string()],
        ..Calibration::default()
    };
    assert!(calibration.validate().is_err());
}

#[test]
fn records_to_csv_applies_sentinels_and_escaping() {
    let record = Record {
        page: 1,
        region: None,
        brand: Some("HAGAFEN CELLARS".to_string()),
        item_number: "12345".to_string(),
        vintage: "NV".to_string(),
        product_name: "Brut, \"Cuvee\"".to_string(),
        bottles_per_case: 6,
        bottle_size: "750ML".to_string(),
        case_price: "180.00".to_string(),
        bottle_price: None,
        discounts: vec!["$5.00 on 5cs".to_string(), "$9.00 on 10cs".to_string()],
        name_inferred: true,
    };

    let csv = records_to_csv(&[record]);
    let lines = csv.lines().collect::<Vec<&str>>();

    assert_eq!(
        lines[0],
        "Region,Brand,Item#,Vintage,Product Name,Bottles per Case,Bottle Size,Case Price,Bottle Price,Discounts,Name Inferred"
    );
    assert_eq!(
        lines[1],
        "[UNKNOWN REGION],HAGAFEN CELLARS,12345,NV,\"Brut, \"\"Cuvee\"\"\",6,750ML,180.00,,$5.00 on 5cs; $9.00 on 10cs,Yes"
    );
}

#[test]
fn replace_document_records_overwrites_previous_extraction() {
    let mut connection = Connection::open_in_memory().expect("in-memory sqlite opens");
    ensure_schema(&connection).expect("schema created");

    let entry = PriceListEntry {
        filename: "royal_2024-11.json".to_string(),
        path: "royal_2024-11.json".to_string(),
        format: "fragments".to_string(),
        issue: Some("2024-11".to_string()),
        sha256: "abcdef0123456789".to_string(),
    };
    let report = extract(&[page_of(
        1,
        &[
            ("Wine", BODY),
            ("11111 2020 12/750ML 100.00 9.00", BODY),
            ("$5.00 on 5cs", BODY),
            ("$8.00 on 10cs", BODY),
            ("22222 2020 12/750ML 100.00 9.00", BODY),
        ],
    )]);

    replace_document_records(&mut connection, &entry, &report).expect("first write");
    replace_document_records(&mut connection, &entry, &report).expect("second write");

    assert_eq!(doc_id_for(&entry), "royal_2024_11-abcdef012345");
    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM documents").expect("count"),
        1
    );
    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM records").expect("count"),
        2
    );
    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM record_discounts").expect("count"),
        2
    );
    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM records WHERE name_inferred = 1")
            .expect("count"),
        1
    );
}

#[test]
fn render_extract_command_includes_calibration_overrides() {
    let args = ExtractArgs {
        cache_root: PathBuf::from(".cache/pricelist"),
        source_dir: None,
        documents: vec![PathBuf::from("royal.pdf")],
        inventory_manifest_path: None,
        extract_manifest_path: None,
        db_path: None,
        calibration_path: Some(PathBuf::from("royal.json")),
        format: InputFormat::Pdf,
        refresh_inventory: false,
        max_pages_per_doc: Some(4),
        region_font_size: Some(20.5),
        brand_font_size: None,
        name_lookback_lines: Some(6),
        preview_lines: 80,
    };

    let command = render_extract_command(&args);
    assert!(command.contains("--document royal.pdf"));
    assert!(command.contains("--calibration-path royal.json"));
    assert!(command.contains("--format pdf"));
    assert!(command.contains("--region-font-size 20.5"));
    assert!(command.contains("--name-lookback-lines 6"));
    assert!(!command.contains("--brand-font-size"));
}
