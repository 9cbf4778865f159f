/*!
Этот крейт предоставляет потоковое построение текста JSON через байтовые
приёмники, предоставленные вызывающим кодом.

Центральная абстракция — [`Sink`]: функция приёма байтов вместе со своим
состоянием. Ядро никогда не буферизует сверх контракта приёмника и
сообщает число принятых байтов; усечение обнаруживается вызывающим кодом
через состояние приёмника, а не через ошибку.

Поверх приёмников построен форматирующий движок [`format`] в стиле
`printf` с JSON-специфичными глаголами (`%Q` — экранированная строка в
кавычках, `%V` — base64, `%H` — hex, `%M` — вложенный подформат) и два
потоковых переформатировщика: [`pretty`] и [`merge`] (RFC 7396). Движок
не проверяет структуру собираемого вывода: весь буквальный текст формата
пишется как есть.

# Пример

```
use sift_printer::{Arg, format};

let mut out = vec![];
let n = format(&mut out, "{%Q:%d, %Q:[%s]}", &[
    Arg::Quoted("a"),
    Arg::Int(1),
    Arg::Quoted("b"),
    Arg::Str("null"),
]);
assert_eq!(out, b"{\"a\":1, \"b\":[null]}");
assert_eq!(n, out.len());
```
*/

#![deny(missing_docs)]

pub use crate::{
    fmt::{
        Arg, format, format_fixed, format_string, write_base64, write_bool,
        write_f64, write_f64_fixed, write_hex, write_i64, write_quoted,
        write_raw, write_u64,
    },
    merge::merge,
    pretty::pretty,
    sink::{FixedBuf, IoSink, Null, Sink},
};

mod fmt;
mod merge;
mod pretty;
mod sink;
