/*!
Компактный JSON-инструментарий как библиотека.

Эта библиотека предназначена для предоставления высокоуровневого фасада
к крейтам, составляющим инструментарий: потоковому сканеру с селектором
(`scanner`), потоковому построению текста JSON (`printer`) и ядру
JSON-RPC 2.0 (`rpc`). Каждый элемент общедоступного API в составных
крейтах задокументирован; сквозной пример собран в документации крейта
`sift-rpc`.
*/

pub extern crate sift_printer as printer;
pub extern crate sift_rpc as rpc;
pub extern crate sift_scanner as scanner;
