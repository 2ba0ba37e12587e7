use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gateway_core::money::Money;
use gateway_core::pricing::PricingRegistry;
use gateway_core::models::{FamilyPattern, PricingTable, UnitPrice, Usage};
use gateway_core::usage::{OpenAiUsageExtractor, UsageExtractor};
use std::collections::HashMap;

fn openai_table() -> PricingTable {
    let mut models = HashMap::new();
    models.insert(
        "gpt-4o-mini".to_string(),
        UnitPrice {
            prompt_price_per_mtok: Money::from_decimal_str("0.15").unwrap(),
            completion_price_per_mtok: Money::from_decimal_str("0.6").unwrap(),
            description: None,
        },
    );
    let family_patterns = vec![FamilyPattern {
        pattern: regex::Regex::new("^gpt-4o-mini").unwrap(),
        base_model: "gpt-4o-mini".to_string(),
        description: None,
    }];
    PricingTable {
        version: "v1".to_string(),
        models,
        family_patterns,
    }
}

fn bench_pricing_calculation(c: &mut Criterion) {
    let registry = PricingRegistry::new();
    registry.load("openai", openai_table()).unwrap();
    let usage = Usage::new(1000, 500);

    c.bench_function("pricing_calculate_exact_match", |b| {
        b.iter(|| {
            black_box(registry.calculate("openai", "gpt-4o-mini", usage));
        });
    });

    c.bench_function("pricing_calculate_family_pattern", |b| {
        b.iter(|| {
            black_box(registry.calculate("openai", "gpt-4o-mini-2024-07-18", usage));
        });
    });
}

fn bench_sse_frame_parsing(c: &mut Criterion) {
    let frames: Vec<&[u8]> = vec![
        b"data: {\"choices\":[{\"delta\":{\"content\":\"hello\"}}]}\n\n",
        b"data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\n",
        b"data: {\"choices\":[],\"usage\":{\"prompt_tokens\":20,\"completion_tokens\":30,\"total_tokens\":50}}\n\n",
        b"data: [DONE]\n\n",
    ];

    c.bench_function("openai_usage_extractor_feed_chunk", |b| {
        b.iter(|| {
            let mut extractor = OpenAiUsageExtractor::new();
            for frame in &frames {
                black_box(extractor.feed_chunk(frame));
            }
        });
    });
}

criterion_group!(benches, bench_pricing_calculation, bench_sse_frame_parsing);
criterion_main!(benches);
