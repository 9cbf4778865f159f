use sift_scanner::{ParseError, TokenKind, next_entry, scan};

use crate::sink::Sink;

/// Переформатирует значение JSON через приёмник.
///
/// `indent` — единица отступа; пустая строка даёт полностью
/// минифицированный вывод без пробелов после `,` и `:`. При непустом
/// отступе массивы и объекты раскладываются по строкам, пустые контейнеры
/// печатаются как `{}` и `[]` в обоих режимах, а скалярные токены
/// выводятся своим исходным текстом.
///
/// Возвращает число принятых приёмником байтов.
///
/// # Пример
///
/// ```
/// use sift_printer::pretty;
///
/// let mut out = vec![];
/// pretty(b"{ \"a\" :1    }", "  ", &mut out).unwrap();
/// assert_eq!(out, b"{\n  \"a\": 1\n}");
///
/// out.clear();
/// pretty(b"{ \"a\" :1  ,\"b\":2}", "", &mut out).unwrap();
/// assert_eq!(out, b"{\"a\":1,\"b\":2}");
/// ```
pub fn pretty(
    src: &[u8],
    indent: &str,
    sink: &mut dyn Sink,
) -> Result<usize, ParseError> {
    let consumed = scan(src)?;
    let start = src[..consumed]
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
        .unwrap_or(0);
    Ok(value(&src[start..consumed], indent.as_bytes(), 0, sink))
}

/// Печатает одно значение, чей срез точен (без окружающих пробелов).
fn value(src: &[u8], indent: &[u8], depth: usize, sink: &mut dyn Sink) -> usize {
    match src[0] {
        b'{' | b'[' => container(src, indent, depth, sink),
        _ => sink.write(src),
    }
}

/// Печатает контейнер, обходя его прямых потомков.
fn container(
    src: &[u8],
    indent: &[u8],
    depth: usize,
    sink: &mut dyn Sink,
) -> usize {
    let multiline = !indent.is_empty();
    let mut n = sink.write(&src[..1]);
    let mut any = false;
    let mut pos = 0;
    while let Some(e) = next_entry(src, pos) {
        pos = e.end;
        if any {
            n += sink.write(b",");
        }
        if multiline {
            n += sink.write(b"\n");
            n += pad(sink, indent, depth + 1);
        }
        if let Some(key) = e.key {
            n += sink.write(key.bytes);
            n += sink.write(if multiline { b": ".as_slice() } else { b":" });
        }
        n += match e.value.kind {
            TokenKind::Object | TokenKind::Array => {
                container(e.value.bytes, indent, depth + 1, sink)
            }
            _ => sink.write(e.value.bytes),
        };
        any = true;
    }
    if any && multiline {
        n += sink.write(b"\n");
        n += pad(sink, indent, depth);
    }
    n + sink.write(&src[src.len() - 1..])
}

/// Пишет `depth` единиц отступа.
fn pad(sink: &mut dyn Sink, indent: &[u8], depth: usize) -> usize {
    let mut n = 0;
    for _ in 0..depth {
        n += sink.write(indent);
    }
    n
}
