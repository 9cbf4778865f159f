/*!
Этот крейт предоставляет потоковое сканирование JSON и адресный поиск
значений по селектору без построения дерева.

# Краткий обзор

Основной тип в этом крейте — [`Scanner`], который может быть настроен и
создан с помощью [`ScannerBuilder`]. `Scanner` проверяет байтовый срез как
одно значение JSON и передаёт типизированные события токенов в реализацию
[`Emit`], предоставленную вызывающим кодом. Сканер никогда не копирует и
никогда не изменяет входные данные: каждый переданный срез — это подсрез
исходного буфера.

Поверх сканера построены три слоя:

* [`find`] — селекторный движок: интерпретирует путь вида `$.a[2].b` и
  возвращает вид, срез и смещение первого совпавшего токена в порядке
  документа.
* Извлекатели [`get_number`], [`get_bool`], [`get_string`],
  [`get_base64`], [`get_hex`] — тонкие обёртки над [`find`],
  интерпретирующие совпавший срез.
* [`next_entry`] и итератор [`Entries`] — пошаговый обход прямых потомков
  объекта или массива.

Все операции выполняются за один проход и завершаются без приостановок;
никакого внутреннего ввода-вывода нет. Это делает крейт пригодным для
встраиваемых применений: рабочая память ограничена стеком вложенности
фиксированной ёмкости, а результаты всегда указывают внутрь входного
буфера.

# Пример: проверка и события

```
use sift_scanner::{scan, Scanner, Event, EmitFn};

// Проверить вход целиком: возвращается число потреблённых байтов.
assert_eq!(scan(b"{\"a\":[{}]}").unwrap(), 10);

// Подписаться на события токенов.
let mut keys = 0;
let scanner = Scanner::new();
scanner
    .scan(b"{\"a\":1,\"b\":2}", &mut EmitFn(|ev: Event<'_>| {
        if let Event::Key(_) = ev {
            keys += 1;
        }
        true
    }))
    .unwrap();
assert_eq!(keys, 2);
```

# Пример: поиск по селектору

```
use sift_scanner::{find, get_number, TokenKind};

let doc = b"{\"a\":{\"b\":7}}";
let found = find(doc, "$.a").unwrap();
assert_eq!(found.kind, TokenKind::Object);
assert_eq!(found.bytes, b"{\"b\":7}");

assert_eq!(get_number(b"[1,[2,[],3,[4,5]]]", "$[1][3][1]"), Some(5.0));
```

# Синтаксис селектора

Путь начинается с `$` и состоит из шагов `.ident` и `[индекс]`.
Идентификатор завершается первым неэкранированным `.` или `[`;
обратная косая черта перед `.`, `[`, `]` или `\\` экранирует его.
Индексы массивов — неотрицательные десятичные числа. Совпадает первый
токен в порядке документа; дубликаты ключей разрешаются в пользу первого.

Ключи документа сравниваются в сыром виде, без декодирования
escape-последовательностей, поэтому ключ, содержащий экранированную
кавычку, недостижим через селектор.
*/

#![deny(missing_docs)]

pub use crate::{
    find::{Found, find},
    get::{get_base64, get_bool, get_hex, get_number, get_string},
    next::{Entries, Entry, entries, next_entry},
    scan::{
        DEFAULT_MAX_DEPTH, EmitFn, Emit, Event, Ignore, Scanner,
        ScannerBuilder, Token, TokenKind, scan,
    },
};

mod find;
mod get;
mod next;
mod scan;

/// Представляет ошибку, которая может возникнуть при сканировании входа.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseError {
    kind: ParseErrorKind,
    offset: usize,
}

/// Вид ошибки, которая может возникнуть при сканировании входа.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseErrorKind {
    /// Синтаксическое нарушение: неожиданный байт, незавершённое значение,
    /// NUL внутри строки или несогласованная скобка.
    Syntax,
    /// Вложенность превысила настроенный предел сканера.
    TooDeep,
}

impl ParseError {
    pub(crate) fn syntax(offset: usize) -> ParseError {
        ParseError { kind: ParseErrorKind::Syntax, offset }
    }

    pub(crate) fn too_deep(offset: usize) -> ParseError {
        ParseError { kind: ParseErrorKind::TooDeep, offset }
    }

    /// Возвращает вид этой ошибки.
    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    /// Возвращает смещение во входных данных, на котором обнаружена ошибка.
    ///
    /// Для незавершённого значения смещение равно длине входа.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl std::error::Error for ParseError {}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ParseErrorKind::Syntax => {
                write!(f, "invalid JSON input at offset {}", self.offset)
            }
            ParseErrorKind::TooDeep => {
                write!(f, "JSON nesting too deep at offset {}", self.offset)
            }
        }
    }
}

/// Представляет ошибку, которая может возникнуть при извлечении значения.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum GetError {
    /// Путь не разрешился, либо найденный токен имеет другой вид.
    NotFound,
    /// Буфер назначения слишком мал. Буфер остаётся в неопределённом,
    /// но ограниченном состоянии: записано не больше его ёмкости.
    Overflow,
    /// Тело строки не декодируется: неизвестная escape-последовательность,
    /// некорректный `\u`-код, нечётная длина hex или байт вне алфавита.
    Malformed,
}

impl std::error::Error for GetError {}

impl std::fmt::Display for GetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            GetError::NotFound => write!(f, "value not found"),
            GetError::Overflow => {
                write!(f, "destination buffer too small")
            }
            GetError::Malformed => write!(f, "malformed string body"),
        }
    }
}
