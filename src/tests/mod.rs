use crate::bindings::{Binding, BindingTable, ValueKind};
use crate::dataset::{Accounting, Dataset, Fiscal, LineItem, MissingSection, Personnel, Summary};
use crate::loader::CacheWrite;
use crate::page::{HtmlPage, IconRenderer, MemoryPage, Page};
use crate::render::{RenderOutcome, Renderer, SkipReason, DEFAULT_NEGATIVE_CLASS};
use crate::runner::{Options, Runner};
use crate::store::{KeyValueStore, MemoryStore};

#[derive(Default)]
struct CountingIcons {
    calls: usize,
}

impl IconRenderer for CountingIcons {
    fn refresh(&mut self) {
        self.calls += 1;
    }
}

fn june_dataset() -> Dataset {
    Dataset {
        accounting: Some(Accounting {
            summary: Some(Summary {
                gross_revenue: Some(38621924.56),
                deductions: Some(-3599009.10),
                net_revenue: None,
                operating_profit: Some(1250000.0),
                net_profit: Some(980000.0),
            }),
            total_assets: Some(51000000.0),
            total_liabilities: Some(21000000.0),
            income_statement: vec![
                LineItem::new("Receita Bruta", 38621924.56),
                LineItem::new("(-) Deducoes", -3599009.10),
            ],
            balance_sheet: Vec::new(),
        }),
        fiscal: Some(Fiscal {
            total_taxes: Some(3438234.30),
            regime: Some("Lucro Real".to_string()),
        }),
        personnel: Some(Personnel {
            headcount: Some(142.0),
            hires: Some(3.0),
            terminations: Some(1.0),
        }),
        ..Default::default()
    }
}

fn all_elements() -> MemoryPage {
    MemoryPage::with_elements(BindingTable::standard().ids().collect::<Vec<_>>())
}

fn runner() -> Runner {
    Runner::new(Options::default()).unwrap()
}

#[test]
fn every_present_id_gets_its_formatted_value() {
    let mut store = MemoryStore::new();
    let mut page = all_elements();
    let report = runner().page_load(&mut store, Some(&june_dataset()), &mut page, None);
    assert_eq!(report.cache, CacheWrite::Written);
    let rendered = report.outcome.report().unwrap();
    assert_eq!(rendered.written(), rendered.fields.len());

    assert_eq!(page.content("val-receita"), Some("R$ 38.621.925"));
    assert_eq!(page.content("kpi-receita"), Some("R$ 38.621.925"));
    assert_eq!(page.content("val-deducoes"), Some("-R$ 3.599.009"));
    assert_eq!(page.content("val-impostos"), Some("R$ 3.438.234"));
    assert_eq!(page.content("val-headcount"), Some("142"));
    assert_eq!(page.content("val-regime"), Some("Lucro Real"));
    assert_eq!(page.content("val-legal-status"), Some("-"));
    assert_eq!(page.content("val-pendencias"), Some("0"));
}

#[test]
fn net_revenue_is_derived_from_gross_and_deductions() {
    let summary = june_dataset().summary().unwrap().clone();
    let net = summary.net_revenue_or_derived().unwrap();
    assert!((net - 35022915.46).abs() < 1e-6);

    let mut page = all_elements();
    runner().page_load(&mut MemoryStore::new(), Some(&june_dataset()), &mut page, None);
    assert_eq!(page.content("val-receita-liquida"), Some("R$ 35.022.915"));
}

#[test]
fn missing_accounting_writes_nothing() {
    let mut dataset = june_dataset();
    dataset.accounting = None;
    let mut page = all_elements();
    let mut icons = CountingIcons::default();
    let report = runner().page_load(
        &mut MemoryStore::new(),
        Some(&dataset),
        &mut page,
        Some(&mut icons),
    );
    assert_eq!(
        report.outcome,
        RenderOutcome::Skipped(SkipReason::Missing(MissingSection::Accounting))
    );
    assert_eq!(page.writes(), 0);
    assert_eq!(icons.calls, 0);
}

#[test]
fn negative_class_follows_sign() {
    let mut page = all_elements();
    page.insert("val-lucro").classes.push(DEFAULT_NEGATIVE_CLASS.to_string());
    runner().page_load(&mut MemoryStore::new(), Some(&june_dataset()), &mut page, None);

    assert!(page.has_class("val-deducoes", DEFAULT_NEGATIVE_CLASS));
    assert!(!page.has_class("val-lucro", DEFAULT_NEGATIVE_CLASS));
    assert!(!page.has_class("val-receita", DEFAULT_NEGATIVE_CLASS));
    assert!(page
        .content("tbl-dre")
        .unwrap()
        .contains("<td class=\"text-negative\">-R$ 3.599.009</td>"));
}

#[test]
fn negative_profit_gets_the_class() {
    let mut dataset = june_dataset();
    if let Some(summary) = dataset.accounting.as_mut().and_then(|a| a.summary.as_mut()) {
        summary.operating_profit = Some(-120000.0);
    }
    let mut page = all_elements();
    runner().page_load(&mut MemoryStore::new(), Some(&dataset), &mut page, None);
    assert!(page.has_class("kpi-lucro", DEFAULT_NEGATIVE_CLASS));
    assert_eq!(page.content("kpi-lucro"), Some("-R$ 120.000"));
}

#[test]
fn repeated_page_loads_are_idempotent() {
    let runner = runner();
    let mut store = MemoryStore::new();
    let mut first = all_elements();
    runner.page_load(&mut store, Some(&june_dataset()), &mut first, None);
    let mut second = first.clone();
    runner.page_load(&mut store, Some(&june_dataset()), &mut second, None);
    assert_eq!(
        first.element("val-deducoes"),
        second.element("val-deducoes")
    );
    for id in BindingTable::standard().ids() {
        assert_eq!(first.element(id), second.element(id), "{id}");
    }
}

#[test]
fn absent_elements_are_skipped() {
    let mut page = MemoryPage::with_elements(["val-receita", "val-unused"]);
    let outcome = runner().page_load(&mut MemoryStore::new(), Some(&june_dataset()), &mut page, None);
    let report = outcome.outcome.report().unwrap();
    assert_eq!(report.written(), 1);
    assert!(report.missing_elements().any(|f| f.id == "tbl-balanco"));
    assert_eq!(page.content("val-unused"), Some(""));
}

#[test]
fn icon_hook_runs_once_after_render() {
    let mut icons = CountingIcons::default();
    let mut page = all_elements();
    let report = runner().page_load(
        &mut MemoryStore::new(),
        Some(&june_dataset()),
        &mut page,
        Some(&mut icons),
    );
    assert_eq!(icons.calls, 1);
    assert!(report.outcome.report().unwrap().icons_refreshed);
}

#[test]
fn no_source_and_no_cache_renders_nothing() {
    let mut page = all_elements();
    let report = runner().page_load(&mut MemoryStore::new(), None, &mut page, None);
    assert_eq!(report.cache, CacheWrite::NoSource);
    assert_eq!(report.outcome, RenderOutcome::Skipped(SkipReason::NoData));
    assert_eq!(page.writes(), 0);
}

#[test]
fn cached_snapshot_serves_later_renders() {
    let runner = runner();
    let mut store = MemoryStore::new();
    runner.page_load(&mut store, Some(&june_dataset()), &mut MemoryPage::new(), None);

    let mut page = all_elements();
    let outcome = runner.render_cached(&store, &mut page, None);
    assert!(outcome.report().is_some());
    assert_eq!(page.content("val-ativo"), Some("R$ 51.000.000"));
}

#[test]
fn configured_bindings_render_by_path() {
    let options = Options {
        extra_bindings: vec![
            Binding::path("val-periodo", "meta_info.periodo", ValueKind::Text),
            Binding::path("val-headcount", "dp.headcount", ValueKind::Money),
        ],
        ..Options::default()
    };
    let runner = Runner::new(options).unwrap();
    let mut dataset = june_dataset();
    dataset.meta_info = Some(crate::dataset::MetaInfo {
        period: Some("Junho/2025".to_string()),
        updated_at: None,
    });
    let mut page = MemoryPage::with_elements(["val-periodo", "val-headcount"]);
    runner.page_load(&mut MemoryStore::new(), Some(&dataset), &mut page, None);
    assert_eq!(page.content("val-periodo"), Some("Junho/2025"));
    assert_eq!(page.content("val-headcount"), Some("R$ 142"));
}

#[test]
fn runner_rejects_bad_options() {
    assert!(Runner::new(Options {
        decimals: 3,
        ..Options::default()
    })
    .is_err());
    assert!(Runner::new(Options {
        version_key: crate::loader::DEFAULT_DATA_KEY.to_string(),
        ..Options::default()
    })
    .is_err());
    assert!(Runner::new(Options {
        negative_class: "text negative".to_string(),
        ..Options::default()
    })
    .is_err());
}

#[test]
fn two_decimal_revision() {
    let runner = Runner::new(Options {
        decimals: 2,
        ..Options::default()
    })
    .unwrap();
    let mut page = MemoryPage::with_elements(["val-receita", "val-lucro-liquido"]);
    let mut dataset = june_dataset();
    if let Some(summary) = dataset.accounting.as_mut().and_then(|a| a.summary.as_mut()) {
        summary.net_profit = Some(0.0);
    }
    runner.page_load(&mut MemoryStore::new(), Some(&dataset), &mut page, None);
    assert_eq!(page.content("val-receita"), Some("R$ 38.621.924,56"));
    assert_eq!(page.content("val-lucro-liquido"), Some("R$ 0"));
}

#[test]
fn html_page_end_to_end() {
    let html = r#"<html><body>
<div class="card"><h3 id="val-receita" class="kpi text-negative">...</h3></div>
<span id='val-deducoes' class="kpi">...</span>
<table><tbody id="tbl-dre"><tr><td>old</td></tr></tbody></table>
</body></html>"#;
    let mut page = HtmlPage::new(html);
    let mut store = MemoryStore::new();
    let report = runner().page_load(&mut store, Some(&june_dataset()), &mut page, None);
    assert_eq!(report.outcome.report().unwrap().written(), 3);

    assert_eq!(page.content("val-receita"), Some("R$ 38.621.925"));
    assert!(!page.has_class("val-receita", DEFAULT_NEGATIVE_CLASS));
    assert!(page.has_class("val-receita", "kpi"));
    assert_eq!(page.content("val-deducoes"), Some("-R$ 3.599.009"));
    assert!(page.has_class("val-deducoes", DEFAULT_NEGATIVE_CLASS));
    assert!(page.content("tbl-dre").unwrap().starts_with("<tr><td>Receita Bruta</td>"));

    let once = page.clone().into_html();
    runner().page_load(&mut store, Some(&june_dataset()), &mut page, None);
    assert_eq!(page.into_html(), once);
}

#[test]
fn store_keeps_version_marker() {
    let mut store = MemoryStore::new();
    runner().page_load(&mut store, Some(&june_dataset()), &mut MemoryPage::new(), None);
    assert_eq!(
        store.get(crate::loader::DEFAULT_VERSION_KEY).unwrap().as_deref(),
        Some(crate::bindings::TABLE_VERSION)
    );
    assert!(store.get(crate::loader::DEFAULT_DATA_KEY).unwrap().is_some());
}

#[test]
fn default_renderer_matches_runner_defaults() {
    let renderer = Renderer::default();
    let runner = runner();
    assert_eq!(renderer.negative_class, runner.renderer().negative_class);
    assert_eq!(renderer.neutral_markers, runner.renderer().neutral_markers);
}

#[test]
fn ingested_deduction_rows_render_negative() {
    let sheet = crate::ingest::Sheet::from_delimited(
        "DRE 2025",
        "Conta;Descricao;Saldo 2025\n\
         RECEITA BRUTA OPERACIONAL;;38.621.924,56\n\
         (-) DEDUCOES DA RECEITA;;3.599.009,10\n",
    );
    let extraction = crate::ingest::extract_dataset_at(
        &[sheet],
        &crate::ingest::IngestOptions::default(),
        "25/06/2025 14:30",
        "2025-06-25T14:30:00",
    );
    let mut page = all_elements();
    runner().page_load(&mut MemoryStore::new(), Some(&extraction.dataset), &mut page, None);

    let rows = page.content("tbl-dre").unwrap();
    assert!(rows.contains("<td class=\"text-negative\">-R$ 3.599.009</td>"));
    assert!(!rows.contains("<td>R$ 3.599.009</td>"));
    assert!(page.has_class("val-deducoes", DEFAULT_NEGATIVE_CLASS));
}
