//! The Lua loader emitted at the top of every bundle

/// Names the prelude binds in the bundle's top-level scope
pub const REQUIRE_FN: &str = "__bundle_require";
pub const LOADED_TABLE: &str = "__bundle_loaded";
pub const REGISTER_FN: &str = "__bundle_register";
pub const ALIAS_FN: &str = "__bundle_alias";

/// Loader state lives in one closure per bundle. Bodies run on first
/// `require` and receive the canonical name plus any extra arguments. Results
/// are memoized by canonical name; a module required while it is still
/// loading yields `nil`.
const PRELUDE: &str = r#"local __bundle_require, __bundle_loaded, __bundle_register, __bundle_alias = (function(superRequire)
	local loading = {}
	local loaded = {}
	local modules = {}
	local aliases = {}

	local function register(name, body)
		if not modules[name] then
			modules[name] = body
		end
	end

	local function alias(reference, name)
		aliases[reference] = name
	end

	local require
	require = function(reference, ...)
		local name = aliases[reference] or reference
		local result = loaded[name]
		if result == loading then
			return nil
		elseif result ~= nil then
			return result
		end

		local body = modules[name]
		if not body then
			if superRequire then
				return superRequire(reference)
			end
			error("module '" .. tostring(reference) .. "' is not part of this bundle", 2)
		end

		loaded[name] = loading
		result = body(require, name, ...)
		if result == nil then
			result = true
		end
		loaded[name] = result
		return result
	end

	return require, loaded, register, alias
end)("#;

/// Render the prelude. An isolated bundle never falls back to the host `require`.
pub fn prelude(isolate: bool) -> String {
    let super_require = if isolate { "nil" } else { "require" };
    format!("{PRELUDE}{super_require})\n")
}
