use sift_scanner::{Found, ParseError, TokenKind, find, next_entry, scan};

use crate::sink::Sink;

/// Накладывает `overlay` на `base` по правилам JSON Merge Patch
/// (RFC 7396) и передаёт результат в приёмник.
///
/// Объекты сливаются рекурсивно: `null` в наложении удаляет ключ базы,
/// значение другого вида заменяет его; наложение, не являющееся
/// объектом, заменяет базу целиком. Сначала в порядке документа идут
/// ключи базы (кроме удалённых), затем новые ключи наложения.
///
/// Поиск ключей строит селектор `$.key` из сырых байтов ключа, поэтому
/// ключи, содержащие `.` или `[`, при слиянии недостижимы — ограничение
/// разделяется с остальным семейством селекторов.
///
/// Возвращает число принятых приёмником байтов.
///
/// # Пример
///
/// ```
/// use sift_printer::merge;
///
/// let mut out = vec![];
/// merge(b"{\"a\":1,\"b\":2}", b"{\"a\":null,\"c\":3}", &mut out).unwrap();
/// assert_eq!(out, b"{\"b\":2,\"c\":3}");
/// ```
pub fn merge(
    base: &[u8],
    overlay: &[u8],
    sink: &mut dyn Sink,
) -> Result<usize, ParseError> {
    let base = value_span(base)?;
    let overlay = value_span(overlay)?;
    let n = match (base, overlay) {
        (_, Some(o)) if o.kind != TokenKind::Object => sink.write(o.bytes),
        (Some(b), None) => sink.write(b.bytes),
        (None, None) => 0,
        (Some(b), Some(o)) if b.kind == TokenKind::Object => {
            objects(b.bytes, o.bytes, sink)
        }
        // База — не объект: наложение-объект строится с чистого листа,
        // что отбрасывает его null-ключи.
        (_, Some(o)) => objects(b"{}", o.bytes, sink),
    };
    Ok(n)
}

/// Отмеряет точный срез значения, допуская пустой вход.
fn value_span(src: &[u8]) -> Result<Option<Found<'_>>, ParseError> {
    if src.iter().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r')) {
        return Ok(None);
    }
    scan(src)?;
    Ok(find(src, "$"))
}

/// Сливает два объекта; оба среза точны.
fn objects(base: &[u8], overlay: &[u8], sink: &mut dyn Sink) -> usize {
    let mut n = sink.write(b"{");
    let mut comma = false;
    let mut pos = 0;
    while let Some(e) = next_entry(base, pos) {
        pos = e.end;
        let key = match e.key {
            Some(key) => key,
            None => break,
        };
        let patch = find(overlay, &key_path(key.bytes));
        if let Some(p) = patch {
            if p.kind == TokenKind::Null {
                continue;
            }
            n += pair_open(sink, &mut comma, key.bytes);
            if p.kind == TokenKind::Object {
                // Замена не-объекта объектом сливается с чистого листа:
                // null-ключи наложения не доходят до результата.
                let target = if e.value.kind == TokenKind::Object {
                    e.value.bytes
                } else {
                    b"{}"
                };
                n += objects(target, p.bytes, sink);
            } else {
                n += sink.write(p.bytes);
            }
        } else {
            n += pair_open(sink, &mut comma, key.bytes);
            n += sink.write(e.value.bytes);
        }
    }
    // Ключи наложения, которых нет в базе.
    pos = 0;
    while let Some(e) = next_entry(overlay, pos) {
        pos = e.end;
        let key = match e.key {
            Some(key) => key,
            None => break,
        };
        if e.value.kind != TokenKind::Null
            && find(base, &key_path(key.bytes)).is_none()
        {
            n += pair_open(sink, &mut comma, key.bytes);
            if e.value.kind == TokenKind::Object {
                n += objects(b"{}", e.value.bytes, sink);
            } else {
                n += sink.write(e.value.bytes);
            }
        }
    }
    n + sink.write(b"}")
}

/// Пишет разделитель, ключ и двоеточие.
fn pair_open(sink: &mut dyn Sink, comma: &mut bool, key: &[u8]) -> usize {
    let mut n = 0;
    if *comma {
        n += sink.write(b",");
    }
    *comma = true;
    n += sink.write(key);
    n + sink.write(b":")
}

/// Строит селектор `$.key` из ключа с кавычками.
fn key_path(key: &[u8]) -> String {
    let mut path = String::from("$.");
    path.push_str(&String::from_utf8_lossy(&key[1..key.len() - 1]));
    path
}
