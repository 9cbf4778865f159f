use base64::Engine;

use crate::sink::{FixedBuf, Sink};

/// Типизированный аргумент форматирующего движка.
///
/// Глагол формата определяет представление, аргумент несёт значение.
/// C-глаголы с явной длиной (`%.*s`, `%.*Q`) потребляют один срез:
/// длина присуща самому срезу.
#[derive(Clone, Copy)]
pub enum Arg<'a> {
    /// Знаковое целое для `%d` / `%ld`.
    Int(i64),
    /// Беззнаковое целое для `%u` / `%lu`.
    Uint(u64),
    /// Число с плавающей точкой для `%g` / `%f`.
    Double(f64),
    /// Строка, выводимая как есть, без кавычек: `%s`.
    Str(&'a str),
    /// Сырые байты, выводимые как есть: `%.*s`.
    Raw(&'a [u8]),
    /// Строка в кавычках с JSON-экранированием: `%Q`.
    Quoted(&'a str),
    /// Байты в кавычках с JSON-экранированием: `%.*Q`.
    QuotedBytes(&'a [u8]),
    /// `true` или `false`: `%B`.
    Bool(bool),
    /// Байты как base64 в кавычках: `%V`.
    Base64(&'a [u8]),
    /// Байты как строчный hex в кавычках: `%H`.
    Hex(&'a [u8]),
    /// Вложенный подформат, пишущий в тот же приёмник: `%M`.
    Nested(&'a dyn Fn(&mut dyn Sink) -> usize),
}

impl<'a> std::fmt::Debug for Arg<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Arg::Int(v) => f.debug_tuple("Int").field(&v).finish(),
            Arg::Uint(v) => f.debug_tuple("Uint").field(&v).finish(),
            Arg::Double(v) => f.debug_tuple("Double").field(&v).finish(),
            Arg::Str(v) => f.debug_tuple("Str").field(&v).finish(),
            Arg::Raw(v) => f.debug_tuple("Raw").field(&v).finish(),
            Arg::Quoted(v) => f.debug_tuple("Quoted").field(&v).finish(),
            Arg::QuotedBytes(v) => {
                f.debug_tuple("QuotedBytes").field(&v).finish()
            }
            Arg::Bool(v) => f.debug_tuple("Bool").field(&v).finish(),
            Arg::Base64(v) => f.debug_tuple("Base64").field(&v).finish(),
            Arg::Hex(v) => f.debug_tuple("Hex").field(&v).finish(),
            Arg::Nested(_) => f.write_str("Nested(..)"),
        }
    }
}

/// Раскрывает строку формата в приёмник и возвращает суммарное число
/// принятых байтов.
///
/// Буквальный текст формата пишется как есть, включая скобки и запятые,
/// образующие окружающую структуру JSON; движок не проверяет
/// корректность собираемого вывода. `%%` выводит одиночный `%`. Глагол,
/// чей очередной аргумент имеет неподходящий вариант (или аргументы
/// закончились), не выводит ничего; аргумент при этом считается
/// потреблённым, а несоответствие отмечается в журнале отладки.
///
/// Глаголы перечислены в документации [`Arg`]; `%g` печатает кратчайшую
/// однозначно восстановимую десятичную запись (Ryū), `%f` — запись с
/// шестью знаками после точки. Бесконечности и NaN выводятся голыми
/// токенами `inf`, `-inf`, `nan` обоими глаголами.
pub fn format(sink: &mut dyn Sink, fmt: &str, args: &[Arg<'_>]) -> usize {
    let f = fmt.as_bytes();
    let mut args = args.iter();
    let (mut i, mut n) = (0, 0);
    while i < f.len() {
        if f[i] != b'%' {
            let end = f[i..]
                .iter()
                .position(|&b| b == b'%')
                .map(|p| i + p)
                .unwrap_or(f.len());
            n += sink.write(&f[i..end]);
            i = end;
            continue;
        }
        if i + 1 >= f.len() {
            n += sink.write(b"%");
            i += 1;
            continue;
        }
        let rest = &f[i + 1..];
        let (verb, adv) = if rest[0] == b'%' {
            n += sink.write(b"%");
            i += 2;
            continue;
        } else if rest.starts_with(b".*s") {
            (b's', 4)
        } else if rest.starts_with(b".*Q") {
            (b'Q', 4)
        } else if rest.starts_with(b"ld") || rest.starts_with(b"lu") {
            (rest[1], 3)
        } else {
            (rest[0], 2)
        };
        match verb {
            b'd' | b'u' => match args.next() {
                Some(&Arg::Int(v)) => n += write_i64(sink, v),
                Some(&Arg::Uint(v)) => n += write_u64(sink, v),
                other => mismatch(verb, other),
            },
            b'g' => match args.next() {
                Some(&Arg::Double(v)) => n += write_f64(sink, v),
                other => mismatch(verb, other),
            },
            b'f' => match args.next() {
                Some(&Arg::Double(v)) => n += write_f64_fixed(sink, v),
                other => mismatch(verb, other),
            },
            b's' => match args.next() {
                Some(&Arg::Str(v)) => n += write_raw(sink, v.as_bytes()),
                Some(&Arg::Raw(v)) => n += write_raw(sink, v),
                other => mismatch(verb, other),
            },
            b'Q' => match args.next() {
                Some(&Arg::Quoted(v)) => {
                    n += write_quoted(sink, v.as_bytes())
                }
                Some(&Arg::QuotedBytes(v)) => n += write_quoted(sink, v),
                other => mismatch(verb, other),
            },
            b'B' => match args.next() {
                Some(&Arg::Bool(v)) => n += write_bool(sink, v),
                other => mismatch(verb, other),
            },
            b'V' => match args.next() {
                Some(&Arg::Base64(v)) => n += write_base64(sink, v),
                other => mismatch(verb, other),
            },
            b'H' => match args.next() {
                Some(&Arg::Hex(v)) => n += write_hex(sink, v),
                other => mismatch(verb, other),
            },
            b'M' => match args.next() {
                Some(&Arg::Nested(sub)) => n += sub(sink),
                other => mismatch(verb, other),
            },
            _ => {
                log::debug!("unknown format verb %{}", verb as char);
            }
        }
        i += adv;
    }
    n
}

/// Отмечает несоответствие глагола и аргумента в журнале отладки.
fn mismatch(verb: u8, arg: Option<&Arg<'_>>) {
    match arg {
        None => log::debug!("format verb %{} has no argument", verb as char),
        Some(arg) => log::debug!(
            "format verb %{} got mismatched argument {:?}",
            verb as char,
            arg,
        ),
    }
}

/// Раскрывает формат в строку.
///
/// Байты вне UTF-8 (возможные через `%.*s`) заменяются символом
/// замены Unicode.
pub fn format_string(fmt: &str, args: &[Arg<'_>]) -> String {
    let mut out = vec![];
    format(&mut out, fmt, args);
    String::from_utf8_lossy(&out).into_owned()
}

/// Раскрывает формат в фиксированный буфер и возвращает число реально
/// записанных байтов. Усечение молчаливое, как у приёмника
/// [`FixedBuf`].
pub fn format_fixed(buf: &mut [u8], fmt: &str, args: &[Arg<'_>]) -> usize {
    let mut sink = FixedBuf::new(buf);
    format(&mut sink, fmt, args);
    sink.len()
}

/// Пишет байты как есть.
pub fn write_raw(sink: &mut dyn Sink, bytes: &[u8]) -> usize {
    sink.write(bytes)
}

/// Пишет знаковое целое десятичной записью.
pub fn write_i64(sink: &mut dyn Sink, v: i64) -> usize {
    let mut buf = itoa::Buffer::new();
    sink.write(buf.format(v).as_bytes())
}

/// Пишет беззнаковое целое десятичной записью.
pub fn write_u64(sink: &mut dyn Sink, v: u64) -> usize {
    let mut buf = itoa::Buffer::new();
    sink.write(buf.format(v).as_bytes())
}

/// Пишет `true` или `false`.
pub fn write_bool(sink: &mut dyn Sink, v: bool) -> usize {
    sink.write(if v { b"true".as_slice() } else { b"false".as_slice() })
}

/// Пишет число с плавающей точкой кратчайшей однозначно восстановимой
/// десятичной записью (Ryū). `inf`, `-inf` и `nan` выводятся голыми
/// токенами.
pub fn write_f64(sink: &mut dyn Sink, v: f64) -> usize {
    if v.is_nan() {
        return sink.write(b"nan");
    }
    if v.is_infinite() {
        return sink.write(if v < 0.0 { b"-inf".as_slice() } else { b"inf" });
    }
    let mut buf = ryu::Buffer::new();
    sink.write(buf.format_finite(v).as_bytes())
}

/// Пишет число с шестью знаками после точки, как `%f` семейства printf.
pub fn write_f64_fixed(sink: &mut dyn Sink, v: f64) -> usize {
    if v.is_nan() {
        return sink.write(b"nan");
    }
    if v.is_infinite() {
        return sink.write(if v < 0.0 { b"-inf".as_slice() } else { b"inf" });
    }
    let s = format!("{:.6}", v);
    sink.write(s.as_bytes())
}

/// Байт, требующий экранирования в строке JSON, и его escape-символ.
///
/// `/` намеренно не экранируется; обратный извлекатель принимает `\/`.
fn escape_byte(b: u8) -> Option<u8> {
    match b {
        0x08 => Some(b'b'),
        0x0c => Some(b'f'),
        b'\n' => Some(b'n'),
        b'\r' => Some(b'r'),
        b'\t' => Some(b't'),
        b'\\' => Some(b'\\'),
        b'"' => Some(b'"'),
        _ => None,
    }
}

/// Пишет байты как строку JSON в кавычках, экранируя
/// `\b \f \n \r \t \\ \"`. Прочие байты проходят как есть.
pub fn write_quoted(sink: &mut dyn Sink, bytes: &[u8]) -> usize {
    let mut n = sink.write(b"\"");
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if let Some(esc) = escape_byte(b) {
            n += sink.write(&bytes[start..i]);
            n += sink.write(&[b'\\', esc]);
            start = i + 1;
        }
    }
    n += sink.write(&bytes[start..]);
    n + sink.write(b"\"")
}

/// Пишет байты как base64 (стандартный алфавит с дополнением) в
/// кавычках.
pub fn write_base64(sink: &mut dyn Sink, bytes: &[u8]) -> usize {
    let mut n = sink.write(b"\"");
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    n += sink.write(encoded.as_bytes());
    n + sink.write(b"\"")
}

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Пишет байты как строчный hex в кавычках.
pub fn write_hex(sink: &mut dyn Sink, bytes: &[u8]) -> usize {
    let mut n = sink.write(b"\"");
    for &b in bytes {
        n += sink.write(&[
            HEX_DIGITS[(b >> 4) as usize],
            HEX_DIGITS[(b & 0xf) as usize],
        ]);
    }
    n + sink.write(b"\"")
}

#[cfg(test)]
mod tests {
    use crate::sink::{FixedBuf, Null};

    use super::{Arg, format, format_fixed, format_string};

    fn fmt(f: &str, args: &[Arg<'_>]) -> (String, usize) {
        let mut out = vec![];
        let n = format(&mut out, f, args);
        (String::from_utf8(out).unwrap(), n)
    }

    #[test]
    fn doubles_shortest() {
        for (num, expected) in [
            (0.0, "0.0"),
            (0.123, "0.123"),
            (1.23, "1.23"),
            (123.0, "123.0"),
            (-987.65432, "-987.65432"),
            (0.0000000001, "1e-10"),
            (2.34567e-57, "2.34567e-57"),
            (1e300, "1e300"),
            (2.2250738585072011e-308, "2.2250738585072011e-308"),
        ] {
            let (got, n) = fmt("%g", &[Arg::Double(num)]);
            assert_eq!(got, expected);
            assert_eq!(n, expected.len());
        }

        assert_eq!(fmt("%g", &[Arg::Double(f64::INFINITY)]).0, "inf");
        assert_eq!(fmt("%g", &[Arg::Double(f64::NEG_INFINITY)]).0, "-inf");
        assert_eq!(fmt("%g", &[Arg::Double(f64::NAN)]).0, "nan");
    }

    #[test]
    fn doubles_fixed() {
        assert_eq!(fmt("%f", &[Arg::Double(1.23)]).0, "1.230000");
        assert_eq!(fmt("%f", &[Arg::Double(-0.5)]).0, "-0.500000");
        assert_eq!(fmt("%f", &[Arg::Double(f64::INFINITY)]).0, "inf");
        assert_eq!(fmt("%f", &[Arg::Double(f64::NAN)]).0, "nan");
    }

    #[test]
    fn integers() {
        assert_eq!(fmt("%d", &[Arg::Int(-97)]).0, "-97");
        assert_eq!(fmt("%d", &[Arg::Int(0)]).0, "0");
        assert_eq!(fmt("%d", &[Arg::Int(12345678)]).0, "12345678");
        assert_eq!(fmt("%u", &[Arg::Uint(4294967199)]).0, "4294967199");
        assert_eq!(fmt("%u", &[Arg::Uint(3456789012)]).0, "3456789012");
        assert_eq!(fmt("%ld", &[Arg::Int(-1)]).0, "-1");
        assert_eq!(fmt("%lu", &[Arg::Uint(3456789012)]).0, "3456789012");
    }

    #[test]
    fn quoting_and_bools() {
        let (got, n) = fmt("{%Q:%B}", &[Arg::Quoted("a"), Arg::Bool(true)]);
        assert_eq!(got, "{\"a\":true}");
        assert_eq!(n, 10);

        let (got, _) = fmt("{%Q:%B}", &[Arg::Quoted("a"), Arg::Bool(false)]);
        assert_eq!(got, "{\"a\":false}");

        let (got, _) = fmt("%Q", &[Arg::Quoted("")]);
        assert_eq!(got, "\"\"");

        // `/` не экранируется, управляющие символы — да.
        let (got, n) = fmt("%Q", &[Arg::Quoted("a/b\nc")]);
        assert_eq!(got, "\"a/b\\nc\"");
        assert_eq!(n, 8);

        let (got, n) = fmt("%Q", &[Arg::Quoted("a\u{8}\n\u{c}\r\t\"")]);
        assert_eq!(got, "\"a\\b\\n\\f\\r\\t\\\"\"");
        assert_eq!(n, 15);
    }

    #[test]
    fn literal_text_passes_through() {
        let (got, n) = fmt(
            "{%Q:%d, %Q:[%s]}",
            &[Arg::Quoted("a"), Arg::Int(1), Arg::Quoted("b"), Arg::Str("null")],
        );
        assert_eq!(got, "{\"a\":1, \"b\":[null]}");
        assert_eq!(n, 19);

        assert_eq!(fmt("%%", &[]).0, "%");
        assert_eq!(fmt("100%%", &[]).0, "100%");
    }

    #[test]
    fn explicit_length_verbs() {
        let (got, n) = fmt(
            "[%.*Q,%.*s]",
            &[Arg::QuotedBytes(b"ab"), Arg::Raw(b"true")],
        );
        assert_eq!(got, "[\"ab\",true]");
        assert_eq!(n, 11);
    }

    #[test]
    fn nested_subformat() {
        let sub = |sink: &mut dyn crate::Sink| -> usize {
            format(sink, "[%d]", &[Arg::Int(1234)])
        };
        let (got, n) = fmt(
            "{\"a\":%d, \"b\":%u, \"c\":%ld, \"d\":%lu, \"e\":%M}",
            &[
                Arg::Int(-1),
                Arg::Uint(3456789012),
                Arg::Int(-1),
                Arg::Uint(3456789012),
                Arg::Nested(&sub),
            ],
        );
        assert_eq!(
            got,
            "{\"a\":-1, \"b\":3456789012, \"c\":-1, \"d\":3456789012, \
             \"e\":[1234]}",
        );
        assert_eq!(n, 60);
    }

    #[test]
    fn base64_verb() {
        let s = b"0\n\xfeg";
        let (got, n) = fmt(
            "[%V,%V,%V,%V]",
            &[
                Arg::Base64(&s[..1]),
                Arg::Base64(&s[..2]),
                Arg::Base64(&s[..3]),
                Arg::Base64(&s[..4]),
            ],
        );
        assert_eq!(got, "[\"MA==\",\"MAo=\",\"MAr+\",\"MAr+Zw==\"]");
        assert_eq!(n, 33);
    }

    #[test]
    fn hex_verb() {
        let (got, n) = fmt("%H", &[Arg::Hex(b"\x00 \x01 \x02 abc")]);
        assert_eq!(got, "\"002001200220616263\"");
        assert_eq!(n, 20);
    }

    #[test]
    fn null_sink_counts() {
        let n = format(&mut Null, "{%Q:%d}", &[Arg::Quoted("a"), Arg::Int(1)]);
        assert_eq!(n, 7);
    }

    #[test]
    fn mismatched_arguments_emit_nothing() {
        let (got, _) = fmt("[%d]", &[Arg::Str("oops")]);
        assert_eq!(got, "[]");
        let (got, _) = fmt("[%d]", &[]);
        assert_eq!(got, "[]");
    }

    #[test]
    fn convenience_wrappers() {
        let s = format_string("[%d]", &[Arg::Int(123)]);
        assert_eq!(s, "[123]");

        let mut buf = [0u8; 100];
        let n = format_fixed(&mut buf, "{%g}", &[Arg::Double(1.23)]);
        assert_eq!(n, 6);
        assert_eq!(&buf[..n], b"{1.23}");

        // Усечение молчаливое: записывается сколько влезло.
        let mut small = [0u8; 4];
        let n = format_fixed(&mut small, "[%d]", &[Arg::Int(123456)]);
        assert_eq!(n, 4);
        assert_eq!(&small, b"[123");
    }

    #[test]
    fn truncation_is_reported_by_sink_state() {
        // Движок возвращает число принятых байтов; фиксированный буфер
        // сообщает усечение через своё состояние.
        let mut buf = [0u8; 4];
        let mut sink = FixedBuf::new(&mut buf);
        let n = format(&mut sink, "%d", &[Arg::Int(123456789)]);
        assert_eq!(n, 4);
        assert!(sink.overflow());
        assert_eq!(sink.len(), sink.capacity());
    }

    #[test]
    fn output_parses_as_json() {
        let mut out = vec![];
        format(
            &mut out,
            "{%Q:%g,%Q:[%B,%V,%H],%Q:%.*Q}",
            &[
                Arg::Quoted("x"),
                Arg::Double(1.23),
                Arg::Quoted("list"),
                Arg::Bool(true),
                Arg::Base64(b"\x01\x02"),
                Arg::Hex(b"\xfe\x31"),
                Arg::Quoted("tail"),
                Arg::QuotedBytes(b"a\nb"),
            ],
        );
        let v: serde_json::Value =
            serde_json::from_slice(&out).expect("valid JSON");
        assert_eq!(v["x"], 1.23);
        assert_eq!(v["list"][1], "AQI=");
        assert_eq!(v["list"][2], "fe31");
        assert_eq!(v["tail"], "a\nb");
    }
}
