use celx::markup::{compile_page, compile_rules, ComponentRegistry, MarkupParser};
use celx::renderer::WidgetTree;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const PAGE: &str = r#"
<celx>
  <page title="Bench">
    <component name="row-item" label="item">
      <row groups="item"><text>$label</text><button on-submit=":DELETE /items; SWAP #list">x</button><_slot/></row>
    </component>
    <style>
      Text:
        color: white
      Row.item:
        height: 1
    </style>
    <tower eid="list">
      <row-item label="one"/>
      <row-item label="two"><text>extra</text></row-item>
      <row-item label="three"/>
      <text>count: $count</text>
    </tower>
  </page>
</celx>
"#;

/// Action descriptor compilation
fn benchmark_dsl(c: &mut Criterion) {
    c.bench_function("dsl_compile", |b| {
        b.iter(|| {
            celx::dsl::compile(black_box(
                "GET /items; SELECT Text\nSWAP in #list; POST #form /save; APPEND in #log",
            ))
        })
    });
}

/// Benchmark group for markup compilation
fn benchmark_markup(c: &mut Criterion) {
    let mut group = c.benchmark_group("markup");

    group.bench_function("parse", |b| b.iter(|| MarkupParser::parse(black_box(PAGE))));

    let document = MarkupParser::parse(PAGE).expect("bench page parses");
    group.bench_function("compile_page", |b| {
        b.iter(|| {
            let mut registry = ComponentRegistry::new();
            let mut tree = WidgetTree::new();
            compile_page(black_box(&document), &mut registry, &mut tree)
        })
    });

    group.bench_function("style_rules", |b| {
        b.iter(|| compile_rules(black_box("Text:\n  color: white\n  Button:\n    height: 1"), Some("Tower#list")))
    });

    group.finish();
}

criterion_group!(benches, benchmark_dsl, benchmark_markup);
criterion_main!(benches);
