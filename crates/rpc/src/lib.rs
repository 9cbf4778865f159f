/*!
Этот крейт предоставляет кадрирование и диспетчеризацию JSON-RPC 2.0
поверх кадров, разделённых переводом строки.

Центральный тип — [`Channel`]: один двунаправленный канал со своим
реестром методов, обработчиком ответных кадров и приёмным буфером
фиксированной ёмкости. Байты подаются по одному в
[`Channel::process_byte`]; перевод строки завершает кадр, который
классифицируется как запрос или ответ и диспетчеризуется. Ответы
методов уходят в приёмник [`sift_printer::Sink`], предоставленный
вызывающим кодом, — транспорт (сокет, последовательный порт, stdio)
остаётся целиком снаружи.

Имена методов сопоставляются с шаблонами реестра glob-диалектом модуля
[`glob`]. Встроенный метод `rpc.list` отвечает списком
зарегистрированных шаблонов.

# Пример

```
use sift_printer::Arg;
use sift_rpc::Channel;
use sift_scanner::get_number;

let mut channel = Channel::new();
channel.export("sum", |req| {
    let a = get_number(req.params(), "$[0]").unwrap_or(0.0);
    let b = get_number(req.params(), "$[1]").unwrap_or(0.0);
    req.reply(Some(("%g", &[Arg::Double(a + b)])));
});

let mut out = vec![];
for b in b"{\"id\":1,\"method\":\"sum\",\"params\":[2,3]}\n" {
    channel.process_byte(*b, &mut out);
}
assert_eq!(out, b"{\"id\":1,\"result\":5.0}\n");
```
*/

#![deny(missing_docs)]

pub use crate::channel::{
    Channel, ChannelBuilder, DEFAULT_LIST_METHOD, DEFAULT_RECV_CAPACITY,
    ERROR_BAD_PARAMS, ERROR_INTERNAL, ERROR_INVALID, ERROR_NOT_FOUND,
    Request, call,
};

mod channel;
pub mod glob;
