use criterion::{Criterion, criterion_group, criterion_main};
use mcx::config;
use mcx::depend::parse_headers;
use std::hint::black_box;

const MOCK_CONFIG: &str = r#"
[package]
name = "benchmark_firmware"
version = "0.1.0"
standard = "c11"

[build]
compiler = "arm-none-eabi-gcc"
mcu = "cortex-m4"
cflags = ["-Os", "-ffunction-sections"]
linker_script = "stm32f407.ld"

[firmware]
format = "bin"
"#;

const MOCK_DEP_FILE: &str = "build/debug/obj/src/main.o: src/main.c \\\n  \
    include/board.h include/uart.h include/gpio.h \\\n  \
    vendor/cmsis/core_cm4.h vendor/cmsis/cmsis_gcc.h\n";

fn header_exts() -> Vec<String> {
    vec!["h".to_string(), "hh".to_string(), "hpp".to_string()]
}

fn bench_config_parse(c: &mut Criterion) {
    c.bench_function("parse_mcx_toml", |b| {
        b.iter(|| {
            let _: config::McxConfig = toml::from_str(black_box(MOCK_CONFIG)).unwrap();
        })
    });
}

fn bench_dep_parse_small(c: &mut Criterion) {
    let exts = header_exts();
    c.bench_function("parse_dep_file_small", |b| {
        b.iter(|| parse_headers(black_box(MOCK_DEP_FILE), black_box(&exts)))
    });
}

fn bench_dep_parse_large(c: &mut Criterion) {
    // A dep file the size a heavily templated C++ TU produces.
    let mut content = String::from("main.o: main.cpp");
    for i in 0..2000 {
        content.push_str(&format!(" \\\n  include/generated/header_{i}.hpp"));
    }
    content.push('\n');

    let exts = header_exts();
    c.bench_function("parse_dep_file_large", |b| {
        b.iter(|| parse_headers(black_box(&content), black_box(&exts)))
    });
}

criterion_group!(
    benches,
    bench_config_parse,
    bench_dep_parse_small,
    bench_dep_parse_large
);
criterion_main!(benches);
