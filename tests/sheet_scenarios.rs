//! End-to-end behaviour of a sheet built from a definitions file.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use statline::engine::{DependencyCompiler, Environment, VarName};
use statline::{CellSpec, Combiner, CoreError, Definitions, Floor, Sheet, Subscriber};

const DEFINITIONS: &str = r#"
[base]
"unit|base|str" = 0
"unit|class|str" = 0
"unit|base|dex" = 0
"unit|base|spd" = 0
"unit|base|lvl" = 1

[[define]]
name = "unit|total|str"
about = "Strength from every source."
expr = "unit|base|str + unit|class|str"

[[define]]
name = "unit|total|dex"
expr = "unit|base|dex"

[[define]]
name = "unit|total|spd"
expr = "unit|base|spd"

[[define]]
name = "unit|total|atk"
expr = "unit|total|str + floor(unit|base|lvl / 2)"

[[define]]
name = "unit|total|hit"
expr = "unit|total|dex * 2 + floor(unit|total|spd / 2)"

[[define]]
name = "unit|total|avo"
expr = """
// speed counts double once it passes strength
let s = unit|total|spd, w = unit|total|str then
    if s > w then s * 2 elseif s == w then s else 0 end
"""

[[define]]
name = "unit|total|spcost"
expr = "max(unit|total|str - 30, 0) * -1 - 5"

[cost]
names = ["unit|total|spcost"]
"#;

fn name(s: &str) -> VarName {
    VarName::new(s).unwrap()
}

fn sheet() -> Sheet {
    Definitions::from_toml_str(DEFINITIONS)
        .unwrap()
        .into_sheet()
        .unwrap()
}

/// Counts its refreshes.
#[derive(Default)]
struct Counter {
    hits: Cell<usize>,
}

impl Subscriber for Counter {
    fn refresh(&self) -> statline::Result<()> {
        self.hits.set(self.hits.get() + 1);
        Ok(())
    }
}

#[test]
fn test_total_str_follows_base_edits() {
    let store = statline::engine::FormulaStore::builder()
        .base("base_str", 0.0)
        .base("class_bonus_str", 0.0)
        .define("total_str", "base_str + class_bonus_str")
        .build()
        .unwrap();
    let sheet = Sheet::new(store);
    sheet
        .import([(name("base_str"), 5.0), (name("class_bonus_str"), 3.0)])
        .unwrap();
    assert_eq!(sheet.environment().read(&name("total_str")).unwrap(), 8.0);

    let total = sheet.bind(CellSpec::formula(name("total_str"))).unwrap();
    let base = sheet
        .bind(CellSpec::pass_through(name("base_str")).with_range(0.0, 99.0))
        .unwrap();

    base.set_base(12.0).unwrap();
    assert_eq!(total.display(), 15.0);
    assert_eq!(total.shown(), "15");
}

#[test]
fn test_only_dependent_cells_refresh() {
    let sheet = sheet();
    let compiler = sheet.compiler();
    let shown = ["unit|total|atk", "unit|total|hit", "unit|total|avo", "unit|total|spcost"];

    let counters: Vec<Rc<Counter>> = shown.iter().map(|_| Rc::new(Counter::default())).collect();
    for (variable, counter) in shown.iter().zip(&counters) {
        let triggers = compiler.dependencies(&name(variable), &[]).unwrap();
        sheet
            .refresher()
            .register(Rc::<Counter>::downgrade(counter), triggers, [name(variable)])
            .unwrap();
    }

    let refreshed = sheet.set_base(&name("unit|base|dex"), 4.0).unwrap();
    let hits: Vec<usize> = counters.iter().map(|c| c.hits.get()).collect();
    assert_eq!(hits, vec![0, 1, 0, 0]);
    assert_eq!(refreshed, 1);

    sheet.set_base(&name("unit|base|str"), 4.0).unwrap();
    let hits: Vec<usize> = counters.iter().map(|c| c.hits.get()).collect();
    assert_eq!(hits, vec![1, 1, 1, 1]);
}

#[test]
fn test_editing_a_base_does_not_reenter_its_cell() {
    let sheet = sheet();
    let compiler = sheet.compiler();
    let deps = compiler
        .dependencies(&name("unit|total|str"), &[name("unit|base|str")])
        .unwrap();
    assert_eq!(deps, BTreeSet::from([name("unit|class|str")]));

    let field = sheet
        .bind(
            CellSpec::combine(
                name("unit|base|str"),
                name("unit|total|str"),
                Combiner::custom(|_, total| total),
            )
            .with_range(0.0, 60.0),
        )
        .unwrap();
    let atk = sheet.bind(CellSpec::formula(name("unit|total|atk"))).unwrap();

    // Only the attack display listens to the base strength signal.
    assert_eq!(field.set_base(80.0).unwrap(), 1);
    assert_eq!(field.base(), 60.0);
    assert_eq!(field.display(), 60.0);
    assert_eq!(atk.display(), 60.0);

    sheet.set_base(&name("unit|class|str"), 2.0).unwrap();
    assert_eq!(field.display(), 62.0);
    assert_eq!(atk.display(), 62.0);
}

#[test]
fn test_cost_variables_floor_at_minus_one_hundred() {
    let sheet = sheet();
    let variable = name("unit|total|spcost");
    let cost = sheet
        .bind(CellSpec::formula(variable.clone()).with_floor(sheet.floor_for(&variable)))
        .unwrap();
    assert_eq!(cost.display(), -5.0);

    sheet.set_base(&name("unit|base|str"), 50.0).unwrap();
    assert_eq!(cost.display(), -25.0);
    sheet.set_base(&name("unit|base|str"), 500.0).unwrap();
    assert_eq!(cost.display(), -100.0);

    let plain = sheet
        .bind(CellSpec::formula(variable).with_floor(Floor::Zero))
        .unwrap();
    assert_eq!(plain.display(), 0.0);
}

#[test]
fn test_let_and_elseif_formulas() {
    let sheet = sheet();
    let avo = sheet.bind(CellSpec::formula(name("unit|total|avo"))).unwrap();
    sheet
        .import([(name("unit|base|spd"), 9.0), (name("unit|base|str"), 4.0)])
        .unwrap();
    assert_eq!(avo.display(), 18.0);
    sheet.set_base(&name("unit|base|str"), 9.0).unwrap();
    assert_eq!(avo.display(), 9.0);
    sheet.set_base(&name("unit|base|str"), 10.0).unwrap();
    assert_eq!(avo.display(), 0.0);
}

#[test]
fn test_static_walk_covers_every_branch() {
    let sheet = sheet();
    let env = Environment::static_mode(sheet.store());
    let refs = env.references(&name("unit|total|avo")).unwrap();
    assert_eq!(
        refs,
        BTreeSet::from([name("unit|total|spd"), name("unit|total|str")])
    );

    let compiler = DependencyCompiler::new(sheet.store());
    let users = compiler.dependents(&name("unit|base|spd")).unwrap();
    assert_eq!(
        users,
        BTreeSet::from([
            name("unit|total|avo"),
            name("unit|total|hit"),
            name("unit|total|spd"),
        ])
    );
}

#[test]
fn test_sections_can_be_rebuilt() {
    let sheet = sheet();
    let refresher = sheet.refresher();

    refresher.begin_group();
    let hit = sheet.bind(CellSpec::formula(name("unit|total|hit"))).unwrap();
    let _atk = sheet.bind(CellSpec::formula(name("unit|total|atk"))).unwrap();
    let section = refresher.end_group();
    assert_eq!(section.len(), 2);

    assert_eq!(refresher.remove_group(&section), 2);
    assert!(refresher.is_empty());
    sheet.set_base(&name("unit|base|dex"), 3.0).unwrap();
    // Unregistered cells keep their last value.
    assert_eq!(hit.display(), 0.0);
}

#[test]
fn test_load_definitions_file() {
    let path = std::env::temp_dir().join(format!("statline-defs-{}.toml", std::process::id()));
    std::fs::write(&path, DEFINITIONS).unwrap();
    let loaded = Definitions::load(&path);
    std::fs::remove_file(&path).unwrap();

    let sheet = loaded.unwrap().into_sheet().unwrap();
    assert_eq!(sheet.export().len(), 5);
    assert_eq!(sheet.base(&name("unit|base|lvl")).unwrap(), 1.0);
}

#[test]
fn test_oversized_definitions_file_is_refused() {
    let path = std::env::temp_dir().join(format!("statline-big-{}.toml", std::process::id()));
    let padding = "# padding\n".repeat(110_000);
    std::fs::write(&path, padding).unwrap();
    let loaded = Definitions::load(&path);
    std::fs::remove_file(&path).unwrap();

    assert!(matches!(loaded, Err(CoreError::FileTooLarge { .. })));
}

#[test]
fn test_graphviz_output() {
    let sheet = sheet();
    let dot = sheet.compiler().to_dot(&name("unit|total|atk")).unwrap();
    assert_eq!(
        dot,
        "digraph unit_total_atk {\n\
         \tunit_total_atk->unit_base_lvl;\n\
         \tunit_total_atk->unit_total_str;\n\
         \tunit_total_str->unit_base_str;\n\
         \tunit_total_str->unit_class_str;\n\
         }"
    );
}

proptest::proptest! {
    #[test]
    fn prop_import_matches_single_edits(
        str_ in 0.0f64..80.0,
        class in 0.0f64..10.0,
        dex in 0.0f64..30.0,
        spd in 0.0f64..30.0,
    ) {
        let edits = [
            (name("unit|base|str"), str_),
            (name("unit|class|str"), class),
            (name("unit|base|dex"), dex),
            (name("unit|base|spd"), spd),
        ];
        let shown = ["unit|total|atk", "unit|total|hit", "unit|total|avo", "unit|total|spcost"];

        let one_by_one = sheet();
        let cells: Vec<_> = shown
            .iter()
            .map(|v| one_by_one.bind(CellSpec::formula(name(v))).unwrap())
            .collect();
        for (variable, value) in &edits {
            one_by_one.set_base(variable, *value).unwrap();
        }

        let bulk = sheet();
        let bulk_cells: Vec<_> = shown
            .iter()
            .map(|v| bulk.bind(CellSpec::formula(name(v))).unwrap())
            .collect();
        bulk.import(edits.clone()).unwrap();

        for (a, b) in cells.iter().zip(&bulk_cells) {
            proptest::prop_assert_eq!(a.shown(), b.shown());
        }
        proptest::prop_assert_eq!(one_by_one.export(), bulk.export());
    }
}
