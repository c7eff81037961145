use criterion::{black_box, criterion_group, criterion_main, Criterion};
use veil_core::settings::Settings;
use veil_core::{render, Element, FilterKind, Preset, Tree, VirtualDom};

const CHANNELS: [&str; 6] = ["ZDF", "ARD", "arte", "3sat", "NDR", "BR"];

fn search_page(items: usize) -> VirtualDom {
    let mut dom = VirtualDom::new();
    let root = dom.root();
    for i in 0..items {
        let title = if i % 7 == 0 {
            format!("Spielfilm: Folge {}", i)
        } else {
            format!("Sendung {}", i)
        };
        let meta = format!("18.12.2025 | {}", CHANNELS[i % CHANNELS.len()]);
        dom.append(
            root,
            Element::new("div")
                .attr("data-test", "search-result")
                .child(Element::new("h3").text(&title))
                .child(Element::new("p").text(&meta)),
        );
    }
    dom
}

fn bench_render_pass(c: &mut Criterion) {
    let preset = Preset::SearchFilter;
    let config = preset.config();
    let extractor = preset.extractor();
    let options = config.render_options();
    let settings = Settings::new()
        .with_text(FilterKind::Prefix, "Spielfilm:\nDoku:")
        .with_text(FilterKind::Channel, "ZDF, arte");

    let mut dom = search_page(2_000);
    let candidates = veil_core::extract::collect_candidates(&dom, &config.shape, &extractor);

    c.bench_function("extract_2000", |b| {
        b.iter(|| veil_core::extract::collect_candidates(black_box(&dom), &config.shape, &extractor))
    });

    // First pass applies the markers; the measured passes are steady state.
    render(&mut dom, &candidates, &settings, &options);
    c.bench_function("render_steady_2000", |b| {
        b.iter(|| render(black_box(&mut dom), &candidates, &settings, &options))
    });

    c.bench_function("candidates_2000", |b| {
        b.iter(|| black_box(&dom).candidates(&config.shape).len())
    });
}

criterion_group!(benches, bench_render_pass);
criterion_main!(benches);
