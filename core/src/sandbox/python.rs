use super::exception::Exception;
use super::value::{Dict, Value};
use crate::agent::ChatEntry;
use rustpython_vm::builtins::{
    PyBaseExceptionRef, PyDict, PyFloat, PyInt, PyList, PyModule, PyStr, PyTuple,
};
use rustpython_vm::{AsObject, PyObjectRef, PyResult, VirtualMachine};

pub(super) fn to_py(value: &Value, vm: &VirtualMachine) -> PyResult<PyObjectRef> {
    let object = match value {
        Value::None => vm.ctx.none(),
        Value::Bool(b) => vm.ctx.new_bool(*b).into(),
        Value::Int(i) => vm.ctx.new_int(*i).into(),
        Value::Float(f) => vm.ctx.new_float(*f).into(),
        Value::Str(s) => vm.ctx.new_str(s.as_str()).into(),
        Value::List(items) => vm.ctx.new_list(to_py_all(items, vm)?).into(),
        Value::Tuple(items) => vm.ctx.new_tuple(to_py_all(items, vm)?).into(),
        Value::Dict(dict) => {
            let out = vm.ctx.new_dict();
            for (key, value) in dict.iter() {
                out.set_item(&*to_py(key, vm)?, to_py(value, vm)?, vm)?;
            }
            out.into()
        }
        Value::Entry(entry) => entry_to_py(entry, vm)?,
    };
    Ok(object)
}

fn to_py_all(items: &[Value], vm: &VirtualMachine) -> PyResult<Vec<PyObjectRef>> {
    items.iter().map(|item| to_py(item, vm)).collect()
}

// Entries travel as plain dicts so code can index them like the JSON form.
fn entry_to_py(entry: &ChatEntry, vm: &VirtualMachine) -> PyResult<PyObjectRef> {
    let message = vm.ctx.new_dict();
    message.set_item("role", vm.ctx.new_str(entry.message.role.as_str()).into(), vm)?;
    message.set_item("content", vm.ctx.new_str(entry.message.content.as_str()).into(), vm)?;

    let dict = vm.ctx.new_dict();
    dict.set_item("sender", vm.ctx.new_str(entry.sender.as_str()).into(), vm)?;
    dict.set_item("message", message.into(), vm)?;
    dict.set_item("include_in_chat", vm.ctx.new_bool(entry.include_in_chat).into(), vm)?;
    Ok(dict.into())
}

pub(super) fn from_py(object: &PyObjectRef, vm: &VirtualMachine) -> PyResult<Value> {
    if vm.is_none(object) {
        return Ok(Value::None);
    }
    if object.fast_isinstance(vm.ctx.types.bool_type) {
        return Ok(Value::Bool(object.is(&vm.ctx.true_value)));
    }
    if let Some(int) = object.payload::<PyInt>() {
        return int.try_to_primitive::<i64>(vm).map(Value::Int);
    }
    if let Some(float) = object.payload::<PyFloat>() {
        return Ok(Value::Float(float.to_f64()));
    }
    if let Some(text) = object.payload::<PyStr>() {
        return Ok(Value::Str(text.as_str().to_owned()));
    }
    if let Some(list) = object.payload::<PyList>() {
        let items = list.borrow_vec().to_vec();
        return from_py_all(&items, vm).map(Value::List);
    }
    if let Some(tuple) = object.payload::<PyTuple>() {
        return from_py_all(tuple.as_slice(), vm).map(Value::Tuple);
    }
    if let Ok(dict) = object.clone().downcast::<PyDict>() {
        let mut out = Dict::new();
        for (key, value) in &dict {
            out.insert(from_py(&key, vm)?, from_py(&value, vm)?);
        }
        return Ok(Value::Dict(out).lift_entry());
    }
    Ok(Value::Str(object.repr(vm)?.as_str().to_owned()))
}

fn from_py_all(items: &[PyObjectRef], vm: &VirtualMachine) -> PyResult<Vec<Value>> {
    items.iter().map(|item| from_py(item, vm)).collect()
}

pub(super) fn is_binding_result(object: &PyObjectRef) -> bool {
    !object.is_callable() && !object.payload_is::<PyModule>()
}

pub(super) fn raise(exc: &Exception, vm: &VirtualMachine) -> PyBaseExceptionRef {
    let zoo = &vm.ctx.exceptions;
    let kind = match exc.kind.as_str() {
        "TypeError" => zoo.type_error,
        "ValueError" => zoo.value_error,
        "LookupError" => zoo.lookup_error,
        "KeyError" => zoo.key_error,
        "IndexError" => zoo.index_error,
        "AttributeError" => zoo.attribute_error,
        "NameError" => zoo.name_error,
        "ZeroDivisionError" => zoo.zero_division_error,
        "OverflowError" => zoo.overflow_error,
        "RecursionError" => zoo.recursion_error,
        "TimeoutError" => zoo.timeout_error,
        "MemoryError" => zoo.memory_error,
        _ => zoo.runtime_error,
    };
    vm.new_exception_msg(kind.to_owned(), exc.message.clone())
}

pub(super) fn describe(exc: &PyBaseExceptionRef, vm: &VirtualMachine) -> Exception {
    let kind = (*exc.class().name()).to_owned();
    let message = exc
        .as_object()
        .str(vm)
        .map(|text| text.as_str().to_owned())
        .unwrap_or_default();
    Exception::new(kind, message)
}
